//! Public plan catalogue.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanFeature {
    pub label: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanSummary {
    pub name: String,
    #[serde(rename = "priceINR")]
    pub price_inr: u32,
    pub description: String,
    pub features: Vec<PlanFeature>,
    pub featured: bool,
}

fn features(list: &[(&'static str, bool)]) -> Vec<PlanFeature> {
    list.iter()
        .map(|&(label, available)| PlanFeature {
            label: label.to_string(),
            available,
        })
        .collect()
}

pub fn catalogue() -> Vec<PlanSummary> {
    vec![
        PlanSummary {
            name: "Free".to_string(),
            price_inr: 0,
            description: "Perfect for trying out Rivollo".to_string(),
            features: features(&[
                ("2 product listings", true),
                ("5 AI credits per month", true),
                ("1,000 public views", true),
                ("Basic analytics", true),
                ("Galleries", false),
                ("Advanced analytics", false),
                ("Custom branding", false),
            ]),
            featured: false,
        },
        PlanSummary {
            name: "Pro".to_string(),
            price_inr: 1999,
            description: "Scale with galleries, credits, views, and advanced analytics".to_string(),
            features: features(&[
                ("50 product listings", true),
                ("50 AI credits per month", true),
                ("25,000 public views", true),
                ("10 galleries", true),
                ("Advanced analytics", true),
                ("Priority support", true),
                ("Custom branding", true),
            ]),
            featured: true,
        },
        PlanSummary {
            name: "Enterprise".to_string(),
            price_inr: 0,
            description: "Unlimited everything with dedicated support. Contact sales for pricing.".to_string(),
            features: features(&[
                ("Unlimited products", true),
                ("Unlimited AI credits", true),
                ("Unlimited public views", true),
                ("Unlimited galleries", true),
                ("Advanced analytics", true),
                ("Custom branding", true),
                ("Dedicated account manager", true),
                ("SLA guarantee", true),
            ]),
            featured: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue() {
        let plans = catalogue();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans.iter().filter(|p| p.featured).count(), 1);

        let pro = serde_json::to_value(&plans[1]).unwrap();
        assert_eq!(pro["name"], "Pro");
        assert_eq!(pro["priceINR"], 1999);
        assert!(!plans[0].features.iter().find(|f| f.label == "Galleries").unwrap().available);
    }
}
