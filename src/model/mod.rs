//! Pure data structures shared by every service: orders, drivers,
//! restaurants, and the order status state machine.

pub mod driver;
pub mod order;
pub mod restaurant;

pub use driver::*;
pub use order::*;
pub use restaurant::*;
