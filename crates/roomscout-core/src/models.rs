use serde::{Deserialize, Serialize};

/// A rentable room, as shown in results and on the detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    /// "Neighborhood, City"
    pub location: String,
    pub price: f64,
    pub price_unit: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bills: Option<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub gallery_images: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_highlighted: bool,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub location_details: String,
    #[serde(default)]
    pub available_from: Option<String>,
    #[serde(default)]
    pub minimum_stay: Option<String>,
    pub host: Host,
}

impl Listing {
    /// Neighborhood part of the location ("Cambuí" for "Cambuí, Campinas")
    pub fn neighborhood(&self) -> &str {
        self.location
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }

    /// Price with its unit, e.g. "R$ 850/mês"
    pub fn price_label(&self) -> String {
        format!("R$ {}{}", self.price, self.price_unit)
    }
}

/// Highlighted amenity on the detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub icon: String,
    pub label: String,
}

/// Who rents the room out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

/// Which side of the marketplace an account is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Renter,
    Advertiser,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Renter => write!(f, "renter"),
            Role::Advertiser => write!(f, "advertiser"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "renter" | "client" => Ok(Role::Renter),
            "advertiser" | "host" => Ok(Role::Advertiser),
            other => Err(crate::Error::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

/// The signed-in account a profile operation acts for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// One profile, whatever table it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// A single field change requested on a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileChange {
    DisplayName(String),
    Phone(Option<String>),
    AvatarUrl(String),
}

impl ProfileRecord {
    /// Apply acknowledged changes to the local copy
    pub fn apply(&mut self, changes: &[ProfileChange]) {
        for change in changes {
            match change {
                ProfileChange::DisplayName(name) => self.display_name = name.clone(),
                ProfileChange::Phone(phone) => self.phone = phone.clone(),
                ProfileChange::AvatarUrl(url) => self.avatar_url = Some(url.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_from_camel_case_json() {
        let json = r#"{
            "id": "1",
            "title": "Quarto individual próximo à Unicamp",
            "location": "Barão Geraldo, Campinas",
            "price": 850,
            "priceUnit": "/mês",
            "tags": ["Wi-Fi", "Suíte"],
            "isHighlighted": true,
            "host": {"name": "Ana Oliveira", "imageUrl": "https://img/ana.jpg"}
        }"#;

        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.price, 850.0);
        assert_eq!(listing.price_unit, "/mês");
        assert!(listing.is_highlighted);
        assert!(!listing.is_new);
        assert_eq!(listing.neighborhood(), "Barão Geraldo");
        assert_eq!(listing.host.name, "Ana Oliveira");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Advertiser".parse::<Role>().unwrap(), Role::Advertiser);
        assert_eq!("client".parse::<Role>().unwrap(), Role::Renter);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_profile_apply_changes() {
        let mut profile = ProfileRecord {
            id: "u-1".into(),
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: Some("19 99999-0000".into()),
            avatar_url: None,
        };

        profile.apply(&[
            ProfileChange::DisplayName("Ana Paula".into()),
            ProfileChange::Phone(None),
            ProfileChange::AvatarUrl("https://cdn/a.png".into()),
        ]);

        assert_eq!(profile.display_name, "Ana Paula");
        assert_eq!(profile.phone, None);
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(profile.email, "ana@example.com");
    }
}
