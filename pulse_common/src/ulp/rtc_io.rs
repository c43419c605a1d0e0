//! GPIO to RTC IO number mapping (ESP32).
//!
//! Only these 18 GPIOs can be routed to the RTC IO domain and sampled by
//! the ULP coprocessor while the main CPU sleeps.

/// `(gpio, rtc_io)` pairs, ordered by RTC IO number.
pub const RTC_IO_MAP: [(u8, u8); 18] = [
    (36, 0),
    (37, 1),
    (38, 2),
    (39, 3),
    (34, 4),
    (35, 5),
    (25, 6),
    (26, 7),
    (33, 8),
    (32, 9),
    (4, 10),
    (0, 11),
    (2, 12),
    (15, 13),
    (13, 14),
    (12, 15),
    (14, 16),
    (27, 17),
];

/// RTC IO number of a GPIO, `None` if it cannot be routed to the RTC domain.
pub fn rtc_io_number(gpio: u8) -> Option<u8> {
    RTC_IO_MAP
        .iter()
        .find(|(g, _)| *g == gpio)
        .map(|(_, rtc)| *rtc)
}

/// Whether a GPIO can be used by the ULP program.
#[inline]
pub fn is_valid_rtc_gpio(gpio: u8) -> bool {
    rtc_io_number(gpio).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mappings() {
        assert_eq!(rtc_io_number(36), Some(0));
        assert_eq!(rtc_io_number(33), Some(8));
        assert_eq!(rtc_io_number(27), Some(17));
    }

    #[test]
    fn non_rtc_pins() {
        for gpio in [1, 3, 5, 16, 17, 18, 19, 21, 22, 23] {
            assert!(!is_valid_rtc_gpio(gpio), "GPIO{gpio} has no RTC IO");
        }
    }

    #[test]
    fn rtc_numbers_are_dense_and_unique() {
        for (expected, (_, rtc)) in RTC_IO_MAP.iter().enumerate() {
            assert_eq!(*rtc as usize, expected);
        }
    }
}
