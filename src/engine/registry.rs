//! The fixed set of collections known to the local store, with their seed data.

use serde_json::{json, Value};

use crate::model::{Document, Timestamp};

/// Prefix of every storage key written by the local store.
pub const STORAGE_KEY_PREFIX: &str = "launchpad.";

/// A registered collection: its storage key and the records it starts with.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    name: String,
    storage_key: String,
    defaults: Vec<Document>,
}

impl CollectionSpec {
    /// Registers `name` with the given seed documents under the default storage key.
    pub fn new(name: impl Into<String>, defaults: Vec<Document>) -> Self {
        let name = name.into();
        let storage_key = format!("{}{}", STORAGE_KEY_PREFIX, name);
        Self {
            name,
            storage_key,
            defaults,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Seed documents, used until the collection is first written.
    pub fn defaults(&self) -> &[Document] {
        &self.defaults
    }
}

/// Maps collection names to their [`CollectionSpec`]. Order is registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: Vec<CollectionSpec>,
}

impl Registry {
    pub fn new(collections: Vec<CollectionSpec>) -> Self {
        Self { collections }
    }

    /// The storefront's content collections.
    pub fn builtin() -> Self {
        Self::new(vec![
            CollectionSpec::new("heroSlides", hero_slides()),
            CollectionSpec::new("carouselImages", carousel_images()),
            CollectionSpec::new("newsCategories", news_categories()),
            CollectionSpec::new("news", news()),
            CollectionSpec::new("productLabels", product_labels()),
            CollectionSpec::new("products", products()),
            CollectionSpec::new("categories", categories()),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.name.clone()).collect()
    }
}

fn seed(records: Vec<(&str, Value)>) -> Vec<Document> {
    records
        .into_iter()
        .map(|(id, value)| Document::from_json(id, value))
        .collect()
}

fn published(seconds: i64) -> Value {
    Timestamp::new(seconds, 0).into()
}

fn hero_slides() -> Vec<Document> {
    seed(vec![
        (
            "hero-1",
            json!({
                "title": "Reach for the sky",
                "subtitle": "Competition-grade model rocket kits",
                "image": "/images/hero/launch-pad.jpg",
                "link": "/products",
                "order": 1,
                "active": true
            }),
        ),
        (
            "hero-2",
            json!({
                "title": "New: Aurora two-stage kit",
                "subtitle": "Engineered for 600 m apogee",
                "image": "/images/hero/aurora.jpg",
                "link": "/products/aurora-2s",
                "order": 2,
                "active": true
            }),
        ),
        (
            "hero-3",
            json!({
                "title": "Workshops for schools",
                "subtitle": "Hands-on rocketry for classrooms",
                "image": "/images/hero/workshop.jpg",
                "link": "/offer",
                "order": 3,
                "active": false
            }),
        ),
    ])
}

fn carousel_images() -> Vec<Document> {
    seed(vec![
        ("carousel-1", json!({ "src": "/images/carousel/ignition.jpg", "alt": "Motor ignition", "order": 1 })),
        ("carousel-2", json!({ "src": "/images/carousel/recovery.jpg", "alt": "Parachute recovery", "order": 2 })),
        ("carousel-3", json!({ "src": "/images/carousel/assembly.jpg", "alt": "Kit assembly", "order": 3 })),
    ])
}

fn news_categories() -> Vec<Document> {
    seed(vec![
        ("news-cat-1", json!({ "name": "Launch reports", "slug": "launch-reports", "order": 1 })),
        ("news-cat-2", json!({ "name": "Product updates", "slug": "product-updates", "order": 2 })),
        ("news-cat-3", json!({ "name": "Events", "slug": "events", "order": 3 })),
    ])
}

fn news() -> Vec<Document> {
    seed(vec![
        (
            "news-1",
            json!({
                "title": "Spring launch day recap",
                "excerpt": "Forty-two flights, one record altitude.",
                "categoryId": "news-cat-1",
                "author": "Launch crew",
                "publishedAt": published(1_711_962_000),
                "featured": true
            }),
        ),
        (
            "news-2",
            json!({
                "title": "Aurora kit now ships with reloadable motor mount",
                "excerpt": "Every Aurora kit now includes a 29 mm reloadable mount.",
                "categoryId": "news-cat-2",
                "author": "Product team",
                "publishedAt": published(1_714_554_000),
                "featured": false
            }),
        ),
        (
            "news-3",
            json!({
                "title": "Meet us at the regional rocketry fair",
                "excerpt": "Booth 14, live static motor tests all weekend.",
                "categoryId": "news-cat-3",
                "author": "Events team",
                "publishedAt": published(1_717_232_400),
                "featured": false
            }),
        ),
    ])
}

fn product_labels() -> Vec<Document> {
    seed(vec![
        ("label-1", json!({ "name": "New", "color": "#2563eb" })),
        ("label-2", json!({ "name": "Bestseller", "color": "#f59e0b" })),
        ("label-3", json!({ "name": "Beginner friendly", "color": "#10b981" })),
    ])
}

fn products() -> Vec<Document> {
    seed(vec![
        (
            "product-1",
            json!({
                "name": "Comet starter kit",
                "slug": "comet-starter",
                "categoryId": "category-1",
                "labels": ["label-3"],
                "price": 49.9,
                "currency": "EUR",
                "inStock": true,
                "image": "/images/products/comet.jpg",
                "specs": { "length_mm": 420, "diameter_mm": 24, "max_altitude_m": 150 }
            }),
        ),
        (
            "product-2",
            json!({
                "name": "Aurora two-stage kit",
                "slug": "aurora-2s",
                "categoryId": "category-2",
                "labels": ["label-1", "label-2"],
                "price": 189.0,
                "currency": "EUR",
                "inStock": true,
                "image": "/images/products/aurora.jpg",
                "specs": { "length_mm": 1150, "diameter_mm": 41, "max_altitude_m": 600 }
            }),
        ),
        (
            "product-3",
            json!({
                "name": "Launch controller LC-2",
                "slug": "launch-controller-lc2",
                "categoryId": "category-3",
                "labels": [],
                "price": 74.5,
                "currency": "EUR",
                "inStock": false,
                "image": "/images/products/lc2.jpg",
                "specs": { "channels": 2, "range_m": 15 }
            }),
        ),
        (
            "product-4",
            json!({
                "name": "Recovery parachute 60 cm",
                "slug": "parachute-60",
                "categoryId": "category-3",
                "labels": ["label-2"],
                "price": 19.9,
                "currency": "EUR",
                "inStock": true,
                "image": "/images/products/parachute.jpg",
                "specs": { "diameter_mm": 600 }
            }),
        ),
    ])
}

fn categories() -> Vec<Document> {
    seed(vec![
        ("category-1", json!({ "name": "Starter kits", "slug": "starter-kits", "order": 1 })),
        ("category-2", json!({ "name": "Advanced kits", "slug": "advanced-kits", "order": 2 })),
        ("category-3", json!({ "name": "Launch equipment", "slug": "launch-equipment", "order": 3 })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_collections_are_seeded() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.names(),
            vec!["heroSlides", "carouselImages", "newsCategories", "news", "productLabels", "products", "categories"]
        );
        for name in registry.names() {
            let spec = registry.get(&name).unwrap();
            assert!(!spec.defaults().is_empty(), "{} has no defaults", name);
            assert_eq!(spec.storage_key(), format!("launchpad.{}", name));
        }
    }

    #[test]
    fn test_seed_ids_unique_per_collection() {
        let registry = Registry::builtin();
        for name in registry.names() {
            let defaults = registry.get(&name).unwrap().defaults();
            let mut ids: Vec<&str> = defaults.iter().map(|d| d.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), defaults.len());
        }
    }

    #[test]
    fn test_unknown_collection() {
        let registry = Registry::builtin();
        assert!(registry.get("orders").is_none());
        assert!(!registry.contains("orders"));
    }
}
