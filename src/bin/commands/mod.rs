mod brigade;

pub use self::brigade::*;
