#![allow(unused_imports)]

//! Database models split into separate files.

pub mod activity;
pub mod booking;
pub mod share;
pub mod user;

pub use self::activity::*;
pub use self::booking::*;
pub use self::share::*;
pub use self::user::*;
