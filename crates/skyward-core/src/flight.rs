use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FLIGHT_COUNT;

/// One booked seat: who booked and at which bonus tier. Bookings exist so
/// that a booking token has something to be issued against; they carry no
/// security weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: u32,
    #[serde(rename = "customerID")]
    pub customer_id: u32,
    #[serde(rename = "tierID")]
    pub tier_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: u32,
    pub bookings: Vec<Booking>,
}

impl Flight {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            bookings: Vec::new(),
        }
    }

    /// Append a booking; ids are 1-based per flight.
    pub fn add_booking(&mut self, customer_id: u32, tier_id: &str) {
        let id = self.bookings.len() as u32 + 1;
        self.bookings.push(Booking {
            id,
            customer_id,
            tier_id: tier_id.to_string(),
        });
    }
}

/// The default offering: flights 0..100, no bookings yet. A BTreeMap keeps
/// `system/info` output ordered without an extra sort.
pub fn default_flight_map() -> BTreeMap<u32, Flight> {
    (0..DEFAULT_FLIGHT_COUNT).map(|i| (i, Flight::new(i))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_has_hundred_flights() {
        let flights = default_flight_map();
        assert_eq!(flights.len(), 100);
        assert!(flights.values().all(|f| f.bookings.is_empty()));
    }

    #[test]
    fn booking_ids_count_from_one() {
        let mut flight = Flight::new(2);
        flight.add_booking(7, "middle");
        flight.add_booking(8, "low");
        assert_eq!(flight.bookings[0].id, 1);
        assert_eq!(flight.bookings[1].id, 2);
        assert_eq!(flight.bookings[1].customer_id, 8);
    }
}
