pub mod constants;
pub mod error;
pub mod flight;
pub mod types;

pub use constants::*;
pub use error::{ErrorKind, SkywardError};
pub use flight::{default_flight_map, Booking, Flight};
pub use types::{Action, AddressBundle};
