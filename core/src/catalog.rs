//! Service catalog: preset providers and plans, plus the cost-splitting
//! arithmetic shown when browsing them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id:          String,
    pub name:        String,
    /// Full monthly price of the plan.
    pub price:       f64,
    pub max_members: u32,
    pub description: String,
    #[serde(default)]
    pub features:    Vec<String>,
    #[serde(default)]
    pub requires_same_household: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub id:        String,
    pub name:      String,
    pub logo:      String,
    #[serde(default)]
    pub terms_url: Option<String>,
    pub plans:     Vec<ServicePlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanSavings {
    /// One member's monthly portion.
    pub share:           f64,
    /// What a member saves versus buying the plan alone.
    pub savings:         f64,
    pub savings_percent: u32,
    /// What the host collects from the other members each month.
    pub host_earnings:   f64,
}

impl ServicePlan {
    pub fn share(&self) -> f64 {
        self.price / self.max_members as f64
    }

    pub fn savings(&self) -> PlanSavings {
        let share = self.share();
        let savings = self.price - share;
        PlanSavings {
            share,
            savings,
            savings_percent: percent(savings, self.price),
            host_earnings: (self.max_members.saturating_sub(1)) as f64 * share,
        }
    }
}

/// One subscription a user holds, as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionShare {
    /// Price the user would pay alone.
    pub personal_price: f64,
    pub your_share:     f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub monthly_savings: f64,
    pub annual_savings:  f64,
    pub savings_percent: u32,
}

pub fn savings_summary(subscriptions: &[SubscriptionShare]) -> SavingsSummary {
    let monthly: f64 = subscriptions.iter().map(|s| s.personal_price - s.your_share).sum();
    let personal: f64 = subscriptions.iter().map(|s| s.personal_price).sum();
    SavingsSummary {
        monthly_savings: monthly,
        annual_savings:  monthly * 12.0,
        savings_percent: percent(monthly, personal),
    }
}

fn percent(part: f64, whole: f64) -> u32 {
    if whole <= 0.0 {
        return 0;
    }
    (part / whole * 100.0).round().max(0.0) as u32
}

/// Read-only view over the loaded providers.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    providers: &'a [ServiceProvider],
}

impl<'a> Catalog<'a> {
    pub fn new(providers: &'a [ServiceProvider]) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &'a [ServiceProvider] {
        self.providers
    }

    pub fn provider(&self, provider_id: &str) -> Option<&'a ServiceProvider> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn plan(&self, provider_id: &str, plan_id: &str) -> Option<(&'a ServiceProvider, &'a ServicePlan)> {
        let provider = self.provider(provider_id)?;
        let plan = provider.plans.iter().find(|p| p.id == plan_id)?;
        Some((provider, plan))
    }
}

/// Two-provider catalog used by EngineConfig::default_test().
pub(crate) fn test_catalog() -> Vec<ServiceProvider> {
    vec![
        ServiceProvider {
            id:        "netflix".into(),
            name:      "Netflix".into(),
            logo:      "/logos/netflix.png".into(),
            terms_url: None,
            plans: vec![
                ServicePlan {
                    id:          "netflix-standard-hd".into(),
                    name:        "Standard".into(),
                    price:       15.49,
                    max_members: 2,
                    description: "Watch in Full HD on 2 supported devices at a time".into(),
                    features:    vec!["Full HD".into(), "2 devices".into(), "Ad-free".into()],
                    requires_same_household: false,
                },
                ServicePlan {
                    id:          "netflix-premium".into(),
                    name:        "Premium".into(),
                    price:       22.99,
                    max_members: 4,
                    description: "Watch in Ultra HD on 4 supported devices at a time".into(),
                    features:    vec!["Ultra HD".into(), "4 devices".into(), "Ad-free".into()],
                    requires_same_household: false,
                },
            ],
        },
        ServiceProvider {
            id:        "spotify".into(),
            name:      "Spotify".into(),
            logo:      "/logos/spotify.png".into(),
            terms_url: None,
            plans: vec![ServicePlan {
                id:          "spotify-family".into(),
                name:        "Family".into(),
                price:       16.99,
                max_members: 6,
                description: "6 Premium accounts for family members living under one roof".into(),
                features:    vec!["6 Premium accounts".into(), "Ad-free music".into()],
                requires_same_household: true,
            }],
        },
    ]
}
