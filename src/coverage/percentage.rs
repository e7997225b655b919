/// Coverage percentage from covered and total item counts, rounded to the
/// nearest integer
///
/// Returns `-1` when there is nothing to measure, which readers must treat as
/// "no meaningful value" rather than as a low percentage.
pub fn calculate(covered_count: u32, total_count: u32) -> i32 {
    if total_count == 0 {
        return -1;
    }

    (100.0 * f64::from(covered_count) / f64::from(total_count) + 0.5) as i32
}

/// CSS color for a percentage, on a gradient from red (nothing covered) to
/// green (everything covered)
pub fn percentage_color(covered_count: u32, total_count: u32) -> String {
    if covered_count == 0 {
        return "ff0000".to_owned();
    }
    if covered_count == total_count {
        return "00ff00".to_owned();
    }

    let percentage = 100.0 * f64::from(covered_count) / f64::from(total_count);
    let green = (255.0 * percentage / 100.0 + 0.5) as u32;
    let red = 0xFF - green;

    format!("{red:02x}{green:02x}00")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_measure_is_minus_one() {
        assert_eq!(calculate(0, 0), -1);
    }

    #[test]
    fn percentages_round_to_nearest() {
        assert_eq!(calculate(0, 3), 0);
        assert_eq!(calculate(1, 3), 33);
        assert_eq!(calculate(2, 3), 67);
        assert_eq!(calculate(3, 3), 100);
        assert_eq!(calculate(1, 2), 50);
    }

    #[test]
    fn colors_run_from_red_to_green() {
        assert_eq!(percentage_color(0, 4), "ff0000");
        assert_eq!(percentage_color(4, 4), "00ff00");
        assert_eq!(percentage_color(1, 2), "7f8000");
    }
}
