// 🎲 Bet Entity - a wager tracked so it shows up in the money picture

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Checks, Entity, EntityKind, FieldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub description: String,
    pub stake: f64,

    /// Decimal odds (2.0 = even money)
    pub odds: f64,
    pub placed_on: NaiveDate,

    #[serde(default)]
    pub status: BetStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
}

impl Bet {
    pub fn new(description: &str, stake: f64, odds: f64, placed_on: NaiveDate) -> Self {
        Bet {
            description: description.to_string(),
            stake,
            odds,
            placed_on,
            status: BetStatus::Pending,
            payout: None,
        }
    }

    pub fn potential_payout(&self) -> f64 {
        self.stake * self.odds
    }

    /// Net result once settled; None while pending
    pub fn net_result(&self) -> Option<f64> {
        match self.status {
            BetStatus::Pending => None,
            BetStatus::Won => Some(self.payout.unwrap_or_else(|| self.potential_payout()) - self.stake),
            BetStatus::Lost => Some(-self.stake),
            BetStatus::Void => Some(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
}

impl Entity for Bet {
    type Patch = BetPatch;

    const KIND: EntityKind = EntityKind::Bet;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        checks
            .non_empty("description", &self.description)
            .positive("stake", self.stake)
            .check("odds", self.odds > 1.0, "must be greater than 1.0");
        if let Some(payout) = self.payout {
            checks.non_negative("payout", payout);
        }
        checks.finish()
    }

    fn validate_patch(patch: &BetPatch) -> Result<(), Vec<FieldError>> {
        let mut checks = Checks::new();
        if let Some(description) = &patch.description {
            checks.non_empty("description", description);
        }
        if let Some(stake) = patch.stake {
            checks.positive("stake", stake);
        }
        if let Some(odds) = patch.odds {
            checks.check("odds", odds > 1.0, "must be greater than 1.0");
        }
        if let Some(payout) = patch.payout {
            checks.non_negative("payout", payout);
        }
        checks.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet() -> Bet {
        Bet::new("Final match", 20.0, 2.5, NaiveDate::from_ymd_opt(2025, 5, 10).unwrap())
    }

    #[test]
    fn test_bet_net_result() {
        let mut b = bet();
        assert_eq!(b.net_result(), None);

        b.status = BetStatus::Won;
        assert_eq!(b.net_result(), Some(30.0));

        b.status = BetStatus::Lost;
        assert_eq!(b.net_result(), Some(-20.0));
    }

    #[test]
    fn test_bet_odds_must_exceed_one() {
        let mut b = bet();
        b.odds = 1.0;
        let errors = b.validate().unwrap_err();
        assert_eq!(errors[0].field, "odds");
    }

    #[test]
    fn test_bet_status_serializes_snake_case() {
        let fields = bet().to_fields().unwrap();
        assert_eq!(fields["status"], serde_json::json!("pending"));
    }
}
