diesel::table! {
    accounts (id) {
        id -> Uuid,
        role -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cartons (id) {
        id -> Uuid,
        size -> Varchar,
        status -> Varchar,
        merchant_id -> Uuid,
        reservation_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        customer_id -> Uuid,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    accounts,
    cartons,
    reservations,
);
