use crate::db::Db;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a loaded tenant catalog stays fresh.
const CATALOG_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductUnit {
    PerPerson,
    PerEvent,
}

impl ProductUnit {
    pub fn label(self) -> &'static str {
        match self {
            ProductUnit::PerPerson => "per person",
            ProductUnit::PerEvent => "per event",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub capacity_max: u32,
    #[serde(default)]
    pub capacity_by_layout: HashMap<String, u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub unit_price: f64,
    /// Compiled-in blocked dates; holds derived from live events are
    /// layered on top by the availability query.
    #[serde(default)]
    pub blocked_dates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: ProductUnit,
    pub price: f64,
    /// Rooms this product cannot be served in (room-aware filter).
    #[serde(default)]
    pub unavailable_rooms: Vec<String>,
    /// If non-empty, the product is only offered on these dates (date-aware filter).
    #[serde(default)]
    pub available_dates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DepositPolicy {
    /// "percentage" or "fixed"
    pub mode: String,
    pub percentage: f64,
    pub fixed_amount: f64,
    pub min_amount: f64,
    pub deadline_days: i64,
    pub required: bool,
}

impl Default for DepositPolicy {
    fn default() -> Self {
        DepositPolicy {
            mode: "percentage".to_string(),
            percentage: 30.0,
            fixed_amount: 500.0,
            min_amount: 100.0,
            deadline_days: 14,
            required: true,
        }
    }
}

impl DepositPolicy {
    pub fn amount_for(&self, total: f64) -> f64 {
        let raw = if self.mode == "fixed" {
            self.fixed_amount
        } else {
            total * self.percentage / 100.0
        };
        (raw.max(self.min_amount) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteVisitConfig {
    /// Weekdays visits are offered on, Mon=1..Sun=7.
    pub weekdays: Vec<u32>,
    pub slots: Vec<String>,
    pub max_proposals: usize,
}

impl Default for SiteVisitConfig {
    fn default() -> Self {
        SiteVisitConfig {
            weekdays: vec![1, 2, 3, 4, 5],
            slots: vec!["10:00".to_string(), "14:00".to_string(), "16:00".to_string()],
            max_proposals: 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Catalog {
    pub venue_name: String,
    pub rooms: Vec<Room>,
    pub products: Vec<Product>,
    pub deposit: DepositPolicy,
    pub faq: Vec<FaqEntry>,
    pub site_visit: SiteVisitConfig,
}

impl Catalog {
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// Match a free-form room reference ("Room B", "the B room", exact id).
    pub fn room_by_reference(&self, reference: &str) -> Option<&Room> {
        let needle = reference.trim().to_lowercase();
        self.rooms.iter().find(|r| {
            r.id.to_lowercase() == needle
                || r.name.to_lowercase() == needle
                || needle.contains(&r.name.to_lowercase())
        })
    }

    pub fn largest_capacity(&self) -> u32 {
        self.rooms.iter().map(|r| r.capacity_max).max().unwrap_or(0)
    }

    /// Products servable for the given date and room.
    pub fn products_for(&self, date: Option<&str>, room_id: Option<&str>) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| match date {
                Some(d) if !p.available_dates.is_empty() => {
                    p.available_dates.iter().any(|a| a == d)
                }
                _ => true,
            })
            .filter(|p| match room_id {
                Some(r) => !p.unavailable_rooms.iter().any(|u| u == r),
                None => true,
            })
            .collect()
    }

    pub fn product_by_name(&self, reference: &str) -> Option<&Product> {
        let needle = reference.trim().to_lowercase();
        self.products
            .iter()
            .find(|p| p.name.to_lowercase() == needle || needle.contains(&p.name.to_lowercase()))
    }
}

/// Built-in venue used until a tenant overrides sections via the config API.
pub fn default_catalog() -> Catalog {
    let room = |id: &str, name: &str, cap: u32, layouts: &[(&str, u32)], features: &[&str], services: &[&str], price: f64| Room {
        id: id.to_string(),
        name: name.to_string(),
        capacity_max: cap,
        capacity_by_layout: layouts.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        features: features.iter().map(|s| s.to_string()).collect(),
        services: services.iter().map(|s| s.to_string()).collect(),
        unit_price: price,
        blocked_dates: Vec::new(),
    };
    let product = |id: &str, name: &str, category: &str, unit: ProductUnit, price: f64| Product {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        unit,
        price,
        unavailable_rooms: Vec::new(),
        available_dates: Vec::new(),
    };

    Catalog {
        venue_name: "Lindenhof Events".to_string(),
        rooms: vec![
            room("room_a", "Room A", 120, &[("theater", 120), ("banquet", 90), ("u_shape", 40)], &["stage", "projector", "daylight"], &["catering", "av_support"], 1400.0),
            room("room_b", "Room B", 60, &[("theater", 60), ("banquet", 40), ("u_shape", 25)], &["projector", "daylight", "terrace"], &["catering"], 850.0),
            room("room_c", "Room C", 40, &[("theater", 40), ("banquet", 28), ("boardroom", 18)], &["whiteboard", "video_conferencing"], &["catering", "av_support"], 600.0),
            room("room_d", "Room D", 25, &[("boardroom", 14), ("u_shape", 12), ("theater", 25)], &["whiteboard", "daylight"], &[], 380.0),
            room("room_e", "Room E", 200, &[("theater", 200), ("banquet", 150), ("standing", 250)], &["stage", "projector", "sound_system", "backstage"], &["catering", "av_support", "security"], 2200.0),
        ],
        products: vec![
            product("lunch_business", "Business Lunch", "catering", ProductUnit::PerPerson, 34.0),
            product("coffee_break", "Coffee Break", "catering", ProductUnit::PerPerson, 9.5),
            product("dinner_buffet", "Dinner Buffet", "catering", ProductUnit::PerPerson, 52.0),
            product("wine_package", "Wine Package", "beverages", ProductUnit::PerPerson, 18.0),
            product("soft_drinks", "Soft Drink Flat", "beverages", ProductUnit::PerPerson, 7.0),
            product("vegan_menu", "Vegan Menu", "catering", ProductUnit::PerPerson, 44.0),
            product("projector_rental", "Projector Rental", "equipment", ProductUnit::PerEvent, 80.0),
            product("flipchart", "Flipchart", "equipment", ProductUnit::PerEvent, 25.0),
            product("stage_lighting", "Stage Lighting", "equipment", ProductUnit::PerEvent, 150.0),
            product("dj_package", "DJ Package", "add_ons", ProductUnit::PerEvent, 450.0),
            product("photo_booth", "Photo Booth", "add_ons", ProductUnit::PerEvent, 320.0),
        ],
        deposit: DepositPolicy::default(),
        faq: vec![
            FaqEntry {
                question: "Is parking available?".to_string(),
                answer: "Yes, we have 40 on-site parking spots free of charge for event guests.".to_string(),
                keywords: vec!["parking".to_string(), "park".to_string(), "car".to_string()],
            },
            FaqEntry {
                question: "Is the venue wheelchair accessible?".to_string(),
                answer: "All rooms and restrooms are step-free and wheelchair accessible.".to_string(),
                keywords: vec!["wheelchair".to_string(), "accessible".to_string(), "accessibility".to_string()],
            },
            FaqEntry {
                question: "What is the cancellation policy?".to_string(),
                answer: "Cancellations are free up to 30 days before the event; afterwards the deposit is retained.".to_string(),
                keywords: vec!["cancellation".to_string(), "cancel".to_string(), "policy".to_string(), "refund".to_string()],
            },
        ],
        site_visit: SiteVisitConfig::default(),
    }
}

/// Tenant catalog cache with a short TTL, handle passed through the request
/// context (no process globals).
pub struct CatalogCache {
    inner: Mutex<HashMap<String, (Instant, Catalog)>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        CatalogCache {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl CatalogCache {
    pub fn load(&self, db: &Db, tenant: &str) -> Catalog {
        {
            let cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((at, catalog)) = cache.get(tenant)
                && at.elapsed() < CATALOG_TTL
            {
                return catalog.clone();
            }
        }

        let catalog = load_uncached(db, tenant);
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(tenant.to_string(), (Instant::now(), catalog.clone()));
        catalog
    }

    /// Writes through the config API invalidate the writing node only.
    pub fn invalidate(&self, tenant: &str) {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.remove(tenant);
    }
}

fn load_uncached(db: &Db, tenant: &str) -> Catalog {
    let mut catalog = default_catalog();

    if let Ok(Some(venue)) = db.get_config(tenant, "venue") {
        if let Some(name) = venue.get("venue_name").and_then(|v| v.as_str()) {
            catalog.venue_name = name.to_string();
        }
        if let Some(rooms) = venue.get("rooms")
            && let Ok(rooms) = serde_json::from_value::<Vec<Room>>(rooms.clone())
        {
            catalog.rooms = rooms;
        }
    }
    if let Ok(Some(value)) = db.get_config(tenant, "catalog")
        && let Some(rooms) = value.get("rooms")
        && let Ok(rooms) = serde_json::from_value::<Vec<Room>>(rooms.clone())
    {
        catalog.rooms = rooms;
    }
    if let Ok(Some(value)) = db.get_config(tenant, "products")
        && let Ok(products) = serde_json::from_value::<Vec<Product>>(value)
    {
        catalog.products = products;
    }
    if let Ok(Some(value)) = db.get_config(tenant, "menus")
        && let Ok(mut menus) = serde_json::from_value::<Vec<Product>>(value)
    {
        catalog.products.retain(|p| p.category != "catering");
        catalog.products.append(&mut menus);
    }
    if let Ok(Some(value)) = db.get_config(tenant, "global-deposit")
        && let Ok(policy) = serde_json::from_value::<DepositPolicy>(value)
    {
        catalog.deposit = policy;
    }
    if let Ok(Some(value)) = db.get_config(tenant, "faq")
        && let Ok(faq) = serde_json::from_value::<Vec<FaqEntry>>(value)
    {
        catalog.faq = faq;
    }
    if let Ok(Some(value)) = db.get_config(tenant, "site-visit")
        && let Ok(sv) = serde_json::from_value::<SiteVisitConfig>(value)
    {
        catalog.site_visit = sv;
    }

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_percentage_respects_minimum() {
        let policy = DepositPolicy::default();
        assert_eq!(policy.amount_for(1000.0), 300.0);
        // 30% of 200 is 60, below the 100 minimum.
        assert_eq!(policy.amount_for(200.0), 100.0);
    }

    #[test]
    fn room_reference_matches_loosely() {
        let catalog = default_catalog();
        assert_eq!(catalog.room_by_reference("Room B").unwrap().id, "room_b");
        assert_eq!(catalog.room_by_reference("room_e").unwrap().id, "room_e");
        assert_eq!(
            catalog.room_by_reference("we'd love Room C please").unwrap().id,
            "room_c"
        );
        assert!(catalog.room_by_reference("Room Z").is_none());
    }

    #[test]
    fn product_filters_are_room_and_date_aware() {
        let mut catalog = default_catalog();
        catalog.products[0].unavailable_rooms = vec!["room_d".to_string()];
        catalog.products[1].available_dates = vec!["2026-02-15".to_string()];

        let in_d = catalog.products_for(Some("2026-02-15"), Some("room_d"));
        assert!(!in_d.iter().any(|p| p.id == "lunch_business"));
        assert!(in_d.iter().any(|p| p.id == "coffee_break"));

        let other_day = catalog.products_for(Some("2026-03-01"), Some("room_a"));
        assert!(!other_day.iter().any(|p| p.id == "coffee_break"));
    }
}
