use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ItemType;

/// Read-only itinerary projection used to enrich locks with display data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryDocument {
    pub itinerary_token: String,
    pub cities: Vec<CityPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityPlan {
    pub name: String,
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub items: Vec<PlannedItem>,
}

/// An item as it appears inside the itinerary, with its price snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedItem {
    pub item_type: ItemType,
    pub item_id: String,
    pub metadata: serde_json::Value,
}

/// Where an item sits within the itinerary
#[derive(Debug)]
pub struct ItemContext<'a> {
    pub city_name: &'a str,
    pub date: NaiveDate,
    pub item: &'a PlannedItem,
}

impl ItineraryDocument {
    /// Locate an item across cities and days
    pub fn find_item(&self, item_type: ItemType, item_id: &str) -> Option<ItemContext<'_>> {
        for city in &self.cities {
            for day in &city.days {
                for item in &day.items {
                    if item.item_type == item_type && item.item_id == item_id {
                        return Some(ItemContext {
                            city_name: &city.name,
                            date: day.date,
                            item,
                        });
                    }
                }
            }
        }
        None
    }
}

#[async_trait]
pub trait ItineraryReader: Send + Sync {
    async fn get_itinerary(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<ItineraryDocument, ItineraryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ItineraryError {
    #[error("Itinerary not found: {0}")]
    NotFound(String),

    #[error("Itinerary lookup failed: {0}")]
    LookupFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> ItineraryDocument {
        ItineraryDocument {
            itinerary_token: "itin-1".to_string(),
            cities: vec![
                CityPlan {
                    name: "San Francisco".to_string(),
                    days: vec![DayPlan {
                        date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                        items: vec![PlannedItem {
                            item_type: ItemType::Flight,
                            item_id: "UA100".to_string(),
                            metadata: serde_json::json!({ "price": 412.50 }),
                        }],
                    }],
                },
                CityPlan {
                    name: "Chicago".to_string(),
                    days: vec![DayPlan {
                        date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
                        items: vec![PlannedItem {
                            item_type: ItemType::Hotel,
                            item_id: "GRAND-01".to_string(),
                            metadata: serde_json::json!({ "price": 189.00 }),
                        }],
                    }],
                },
            ],
        }
    }

    #[test]
    fn find_item_walks_cities_and_days() {
        let doc = document();
        let found = doc.find_item(ItemType::Hotel, "GRAND-01").unwrap();
        assert_eq!(found.city_name, "Chicago");
        assert_eq!(found.date, NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert_eq!(found.item.metadata["price"], serde_json::json!(189.00));
    }

    #[test]
    fn find_item_distinguishes_type_and_id() {
        let doc = document();
        assert!(doc.find_item(ItemType::Hotel, "UA100").is_none());
        assert!(doc.find_item(ItemType::Flight, "UA999").is_none());
    }
}
