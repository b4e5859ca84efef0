/// A message, channel, guild, or user identifier.
///
/// The upstream API treats these as opaque strings; the indexer never
/// parses or interprets them beyond equality and ordering as returned by
/// the API itself (e.g. `before=` pagination cursors).
pub type Snowflake = String;
