//! Database schema definitions using sea-query.
//!
//! The table name comes from configuration (`storage.collection`), so only the
//! column identifiers are fixed here.

use sea_query::Iden;

/// Events table columns.
#[derive(Iden)]
pub enum Events {
    /// Insertion order; breaks `received_at` ties.
    #[iden = "seq"]
    Seq,
    #[iden = "id"]
    Id,
    /// Fixed-width RFC 3339, so text order is time order.
    #[iden = "received_at"]
    ReceivedAt,
    /// Payload fields as a JSON object.
    #[iden = "payload"]
    Payload,
}
