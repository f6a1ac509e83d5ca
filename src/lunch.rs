/*
 *  lunch.rs
 *
 *  SchoolRing - the day at a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Today's lunch menu
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::NaiveDate;
use log::{debug, warn};
use serde_json::Value;

pub const LUNCH_UNAVAILABLE: &str = "Lunch Not Available";

const SCHOOL_KEY: &str = "upperschool";
const CATEGORY_KEY: &str = "Main Dish";

#[derive(Debug, Clone, PartialEq)]
pub struct LunchMenu {
    dishes: Vec<String>,
}

impl Default for LunchMenu {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl LunchMenu {
    pub fn unavailable() -> Self {
        Self { dishes: vec![LUNCH_UNAVAILABLE.to_string()] }
    }

    pub fn dishes(&self) -> &[String] {
        &self.dishes
    }

    /// Picks `date`'s main dishes out of a `/lunch/get` response.
    /// Anything missing or malformed falls back to the placeholder menu.
    pub fn from_payload(payload: &Value, date: NaiveDate) -> Self {
        let key = date.format("%Y-%m-%d").to_string();
        let dishes = payload
            .get("lunch")
            .and_then(|l| l.get(&key))
            .and_then(|d| d.get(SCHOOL_KEY))
            .and_then(|s| s.get("categories"))
            .and_then(|c| c.get(CATEGORY_KEY))
            .and_then(Value::as_array);

        let Some(dishes) = dishes else {
            warn!("No lunch listed for {}", key);
            return Self::unavailable();
        };

        let dishes: Vec<String> = dishes
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        if dishes.is_empty() {
            return Self::unavailable();
        }
        debug!("Lunch for {}: {:?}", key, dishes);
        Self { dishes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_dishes_for_today() {
        let payload = json!({
            "lunch": {
                "2026-10-18": { "upperschool": { "categories": { "Main Dish": ["Yesterday"] } } },
                "2026-10-19": { "upperschool": { "categories": { "Main Dish": ["Tacos", "Rice"] } } }
            }
        });
        let menu = LunchMenu::from_payload(&payload, date());
        assert_eq!(menu.dishes(), ["Tacos", "Rice"]);
    }

    #[test]
    fn test_missing_day_is_unavailable() {
        let payload = json!({ "lunch": {} });
        assert_eq!(LunchMenu::from_payload(&payload, date()), LunchMenu::unavailable());
    }

    #[test]
    fn test_malformed_is_unavailable() {
        let payload = json!({
            "lunch": { "2026-10-19": { "upperschool": { "categories": { "Main Dish": "Tacos" } } } }
        });
        assert_eq!(LunchMenu::from_payload(&payload, date()), LunchMenu::unavailable());
        assert_eq!(LunchMenu::from_payload(&json!(null), date()), LunchMenu::unavailable());
    }

    #[test]
    fn test_default_is_placeholder() {
        assert_eq!(LunchMenu::default().dishes(), [LUNCH_UNAVAILABLE]);
    }
}
