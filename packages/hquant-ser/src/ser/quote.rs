use super::{Plot, Ser, Var};
use crate::error::{Error, Result};
use crate::frequency::Frequency;
use crate::types::{Quote, QuoteField};

impl Ser {
    /// Series with the standard quote columns (`open high low close` as
    /// [`Plot::Quote`], `volume amount` as [`Plot::Line`]).
    pub fn quote(name: impl Into<String>, freq: Frequency) -> Self {
        let mut ser = Ser::new(name, freq);
        for field in QuoteField::ALL {
            let plot = match field {
                QuoteField::Volume | QuoteField::Amount => Plot::Line,
                _ => Plot::Quote,
            };
            ser.add_var(field.var_name(), plot);
        }
        ser
    }

    pub fn is_quote_series(&self) -> bool {
        QuoteField::ALL.iter().all(|f| self.has_var(f.var_name()))
    }

    /// Creates (or clears) the row at `quote.time` and writes every field.
    /// Fails before touching any row if a quote column is missing.
    pub fn put_quote(&mut self, quote: &Quote) -> Result<usize> {
        if let Some(field) = QuoteField::ALL
            .iter()
            .find(|f| !self.var(f.var_name()).is_some_and(Var::is_scalar))
        {
            return Err(Error::UnknownVar(format!("{}: no scalar {}", self.name(), field.var_name())));
        }
        let row = self.create_item_or_clear_it(quote.time)?;
        for field in QuoteField::ALL {
            self.set_at(row, field.var_name(), quote.field(field))?;
        }
        Ok(row)
    }

    pub fn quote_at(&self, row: usize) -> Option<Quote> {
        let time = self.time_at(row)?;
        let v = |f: QuoteField| self.value_at(row, f.var_name());
        Some(
            Quote::new(
                time,
                v(QuoteField::Open),
                v(QuoteField::High),
                v(QuoteField::Low),
                v(QuoteField::Close),
                v(QuoteField::Volume),
            )
            .with_amount(v(QuoteField::Amount)),
        )
    }

    /// Quotes of every row from `from_row` to the end.
    pub fn quotes_from(&self, from_row: usize) -> Vec<Quote> {
        (from_row..self.len()).filter_map(|row| self.quote_at(row)).collect()
    }
}
