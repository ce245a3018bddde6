use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SavingsTier {
    Low,
    LowMedium,
    Medium,
    High,
}

impl SavingsTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            SavingsTier::Low => "Low",
            SavingsTier::LowMedium => "Low-Medium",
            SavingsTier::Medium => "Medium",
            SavingsTier::High => "High",
        }
    }
}

/// Rough size of what acting on a finding would save.
///
/// Either a qualitative tier or a monthly dollar figure derived from a flat
/// per-GiB price. Neither is a pricing model; they only rank findings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SavingsEstimate {
    Tier(SavingsTier),
    Monthly(f64),
}

impl SavingsEstimate {
    pub const LOW: Self = SavingsEstimate::Tier(SavingsTier::Low);
    pub const LOW_MEDIUM: Self = SavingsEstimate::Tier(SavingsTier::LowMedium);
    pub const MEDIUM: Self = SavingsEstimate::Tier(SavingsTier::Medium);
    pub const HIGH: Self = SavingsEstimate::Tier(SavingsTier::High);

    /// Rounded to cents so the value matches its `~$X.XX/month` form.
    pub fn monthly(dollars: f64) -> Self {
        SavingsEstimate::Monthly((dollars * 100.0).round() / 100.0)
    }
}

impl fmt::Display for SavingsEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavingsEstimate::Tier(tier) => f.write_str(tier.as_str()),
            SavingsEstimate::Monthly(dollars) => write!(f, "~${dollars:.2}/month"),
        }
    }
}

impl FromStr for SavingsEstimate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("~$") {
            let amount = rest.strip_suffix("/month").unwrap_or(rest).trim();
            return amount
                .parse::<f64>()
                .map(SavingsEstimate::monthly)
                .map_err(|_| format!("invalid monthly savings estimate: {s}"));
        }
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SavingsEstimate::LOW),
            "low-medium" => Ok(SavingsEstimate::LOW_MEDIUM),
            "medium" => Ok(SavingsEstimate::MEDIUM),
            "high" => Ok(SavingsEstimate::HIGH),
            _ => Err(format!(
                "invalid savings estimate: {s} (expected Low|Low-Medium|Medium|High|~$N/month)"
            )),
        }
    }
}

impl Serialize for SavingsEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SavingsEstimate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
