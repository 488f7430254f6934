//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations exactly; Diesel uses them for
//! compile-time query validation.

diesel::table! {
    /// Lending organisations surfaced to the views as lookup records.
    associations (id) {
        /// Surrogate primary key.
        id -> Int4,
        /// Display name shown by the views.
        name -> Varchar,
        /// Login handle for the organisation's account.
        login -> Varchar,
        /// Inactive associations are hidden from lookups.
        active -> Bool,
    }
}

diesel::table! {
    /// Categories an association lends items under.
    categories (id) {
        /// Surrogate primary key.
        id -> Int4,
        /// Category label.
        name -> Varchar,
        /// Owning association.
        association_id -> Int4,
    }
}

diesel::joinable!(categories -> associations (association_id));

diesel::allow_tables_to_appear_in_same_query!(associations, categories);
