use serde::{Deserialize, Serialize};

/// Flat fare charged for rides ending in `destination_city`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FareRule {
    pub id: String,
    pub destination_city: String,
    pub fare: f64,
}

/// Cities a destination can be picked from, sorted by name.
pub fn available_cities(rules: &[FareRule]) -> Vec<&str> {
    let mut cities: Vec<&str> = rules.iter().map(|rule| rule.destination_city.as_str()).collect();
    cities.sort_unstable();
    cities.dedup();
    cities
}

pub fn fare_for_city(rules: &[FareRule], city: &str) -> Option<f64> {
    rules.iter()
        .find(|rule| rule.destination_city == city)
        .map(|rule| rule.fare)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<FareRule> {
        vec![
            FareRule { id: "1".into(), destination_city: "Guaxupé".into(), fare: 20. },
            FareRule { id: "2".into(), destination_city: "Guaranésia".into(), fare: 45. },
            FareRule { id: "3".into(), destination_city: "Muzambinho".into(), fare: 60. },
        ]
    }

    #[test]
    fn cities_are_sorted() {
        assert_eq!(available_cities(&rules()), vec!["Guaranésia", "Guaxupé", "Muzambinho"]);
    }

    #[test]
    fn fare_lookup() {
        assert_eq!(fare_for_city(&rules(), "Guaranésia"), Some(45.));
        assert_eq!(fare_for_city(&rules(), "Nowhere"), None);
    }
}
