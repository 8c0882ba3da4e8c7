mod cents;
mod money;

pub mod op;

pub use cents::{Cents, CurrencyCode, MoneyAmount, MoneyError};
pub use money::{
    apply_percentage_split,
    apply_promotional_discount,
    line_total,
    round_half_up,
    sum_lines,
};
