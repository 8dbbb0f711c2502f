//! Discord snowflakes are u64 but SQLite only stores signed integers.

pub(crate) fn to_db(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db(id: i64) -> u64 {
    id as u64
}

pub(crate) fn opt_to_db(id: Option<u64>) -> Option<i64> {
    id.map(to_db)
}

pub(crate) fn opt_from_db(id: Option<i64>) -> Option<u64> {
    id.map(from_db)
}
