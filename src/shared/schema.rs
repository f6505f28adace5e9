diesel::table! {
    leads (id) {
        id -> Uuid,
        full_name -> Varchar,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        company -> Nullable<Varchar>,
        designation -> Nullable<Varchar>,
        inquiry_type -> Nullable<Varchar>,
        status -> Varchar,
        note -> Nullable<Text>,
        source -> Varchar,
        row_content -> Nullable<Jsonb>,
        assigned_to -> Nullable<Uuid>,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    kb_urls (id) {
        id -> Uuid,
        user_id -> Uuid,
        title -> Varchar,
        drive_url -> Varchar,
        status -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    kb_documents (id) {
        id -> Uuid,
        url_id -> Uuid,
        content -> Nullable<Text>,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    user_profiles (id) {
        id -> Uuid,
        full_name -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        bio -> Nullable<Text>,
        avatar_url -> Nullable<Varchar>,
        plan -> Nullable<Varchar>,
        member_since -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(kb_documents -> kb_urls (url_id));

diesel::allow_tables_to_appear_in_same_query!(leads, kb_urls, kb_documents, user_profiles,);
