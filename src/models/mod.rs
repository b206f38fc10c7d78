mod delivery_stat;
mod scan_record;
mod user;

pub use delivery_stat::*;
pub use scan_record::*;
pub use user::*;
