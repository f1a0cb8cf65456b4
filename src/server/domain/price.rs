use crate::server::model::order::RawPrice;

/// Normalize a heterogeneous catalog price into a plain amount.
///
/// Strings come from legacy admin screens and may carry `.` as a thousands
/// separator and `,` as a decimal comma (`"1.500"` is 1500). Anything that
/// cannot be read as a number degrades to `0` instead of failing the whole
/// computation.
pub(crate) fn normalize(value: &RawPrice) -> f64 {
    match value {
        RawPrice::Number(n) if n.is_finite() => *n,
        RawPrice::Number(_) => 0.0,
        RawPrice::Text(s) => {
            let cleaned = s.trim().replace('.', "").replace(',', ".");
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => n,
                _ => 0.0,
            }
        }
        RawPrice::Missing => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separated_string() {
        assert_eq!(normalize(&RawPrice::Text("1.234".to_string())), 1234.0);
        assert_eq!(normalize(&RawPrice::Text("1.234,5".to_string())), 1234.5);
        assert_eq!(normalize(&RawPrice::Text(" 500 ".to_string())), 500.0);
    }

    #[test]
    fn garbage_and_missing_degrade_to_zero() {
        assert_eq!(normalize(&RawPrice::Text("abc".to_string())), 0.0);
        assert_eq!(normalize(&RawPrice::Text(String::new())), 0.0);
        assert_eq!(normalize(&RawPrice::Missing), 0.0);
        assert_eq!(normalize(&RawPrice::Number(f64::NAN)), 0.0);
        assert_eq!(normalize(&RawPrice::Number(f64::INFINITY)), 0.0);
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(normalize(&RawPrice::Number(1500.0)), 1500.0);
        assert_eq!(normalize(&RawPrice::Number(0.0)), 0.0);
    }

    #[test]
    fn idempotent() {
        for raw in [
            RawPrice::Text("1.234".to_string()),
            RawPrice::Text("abc".to_string()),
            RawPrice::Number(42.0),
            RawPrice::Missing,
        ] {
            let once = normalize(&raw);
            let twice = normalize(&RawPrice::Number(once));
            assert_eq!(once, twice);
        }
    }
}
