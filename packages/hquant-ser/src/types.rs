use serde::{Deserialize, Serialize};

/// One quote row (a bar) as delivered by a data feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Bar open time, ms since epoch (UTC).
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub amount: f64,
}

impl Quote {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            amount: f64::NAN,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    /// Field-wise equality where two NaNs compare equal (a missing amount
    /// stays missing).
    pub fn same_values(&self, other: &Quote) -> bool {
        let eq = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        self.time == other.time
            && QuoteField::ALL
                .iter()
                .all(|f| eq(self.field(*f), other.field(*f)))
    }

    #[inline]
    pub fn field(&self, field: QuoteField) -> f64 {
        match field {
            QuoteField::Open => self.open,
            QuoteField::High => self.high,
            QuoteField::Low => self.low,
            QuoteField::Close => self.close,
            QuoteField::Volume => self.volume,
            QuoteField::Amount => self.amount,
        }
    }
}

/// Standard columns of a quote series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum QuoteField {
    Open = 0,
    High = 1,
    Low = 2,
    Close = 3,
    Volume = 4,
    Amount = 5,
}

impl QuoteField {
    pub const ALL: [QuoteField; 6] = [
        QuoteField::Open,
        QuoteField::High,
        QuoteField::Low,
        QuoteField::Close,
        QuoteField::Volume,
        QuoteField::Amount,
    ];

    /// Var name of this field in a quote series.
    pub const fn var_name(self) -> &'static str {
        match self {
            QuoteField::Open => "open",
            QuoteField::High => "high",
            QuoteField::Low => "low",
            QuoteField::Close => "close",
            QuoteField::Volume => "volume",
            QuoteField::Amount => "amount",
        }
    }
}
