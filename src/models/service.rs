use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub base_price: i64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

/// A barber-specific binding of a catalog service, optionally overriding
/// price and duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub barber_id: i64,
    pub service_id: i64,
    pub custom_price: Option<i64>,
    pub custom_duration: Option<i64>,
    pub is_available: bool,
}

impl ServiceOffering {
    pub fn effective_price(&self, service: &Service) -> i64 {
        self.custom_price.unwrap_or(service.base_price)
    }

    pub fn effective_duration(&self, service: &Service) -> i64 {
        self.custom_duration.unwrap_or(service.duration_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_service() -> Service {
        Service {
            id: 1,
            category_id: 1,
            name: "Classic Cut".to_string(),
            base_price: 50000,
            duration_minutes: 30,
            is_active: true,
        }
    }

    #[test]
    fn test_effective_falls_back_to_catalog() {
        let offering = ServiceOffering {
            barber_id: 1,
            service_id: 1,
            custom_price: None,
            custom_duration: None,
            is_available: true,
        };
        let service = catalog_service();
        assert_eq!(offering.effective_price(&service), 50000);
        assert_eq!(offering.effective_duration(&service), 30);
    }

    #[test]
    fn test_effective_prefers_override() {
        let offering = ServiceOffering {
            barber_id: 1,
            service_id: 1,
            custom_price: Some(65000),
            custom_duration: Some(45),
            is_available: true,
        };
        let service = catalog_service();
        assert_eq!(offering.effective_price(&service), 65000);
        assert_eq!(offering.effective_duration(&service), 45);
    }
}
