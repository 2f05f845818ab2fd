pub mod identities;
pub mod rd_id;
