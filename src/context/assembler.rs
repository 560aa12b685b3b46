use rust_decimal::Decimal;
use std::fmt;

use super::AggregateSnapshot;
use crate::config::ContextConfig;

const HEADER: &str = "=== DADOS DO SISTEMA ===";
const EXTRA_PREFIX: &str = "Contexto: ";
const ELLIPSIS: char = '…';

/// Format a monetary value with two decimals, e.g. `R$ 1234.50`.
pub fn format_money(symbol: &str, amount: Decimal) -> String {
    format!("{} {}", symbol, cents(amount))
}

/// Two-decimal rendering without a currency symbol.
fn cents(amount: Decimal) -> String {
    let mut value = amount.round_dp(2);
    value.rescale(2);
    value.to_string()
}

/// Bounded text rendering of a snapshot, ready to embed in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext(String);

impl PromptContext {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for PromptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders an [`AggregateSnapshot`] into a compact, fixed-shape [`PromptContext`].
///
/// Line order: header, counts, revenue, then the optional recent customers, recent
/// orders and stocked products, and finally the caller-supplied context. The numeric
/// lines are always kept. A list that does not fit in the remaining budget is dropped
/// whole; the caller-supplied context is cut at a word boundary instead.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
    currency_symbol: String,
}

impl ContextAssembler {
    pub fn new(max_chars: usize, currency_symbol: impl Into<String>) -> Self {
        Self {
            max_chars,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_chars, config.currency_symbol.clone())
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Render the snapshot, optionally with caller-supplied context.
    pub fn assemble(&self, snapshot: &AggregateSnapshot, extra: Option<&str>) -> PromptContext {
        let summary = self.summary_lines(snapshot);
        let summary_len = summary.chars().count();

        if summary_len >= self.max_chars {
            return PromptContext(truncate_chars(&summary, self.max_chars));
        }

        let mut remaining = self.max_chars - summary_len;

        // Caller context is reserved before the optional lists
        let extra_line = extra
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|text| {
                let line = format!("{}{}", EXTRA_PREFIX, flatten(text));
                // One char for the separating newline
                let budget = remaining.saturating_sub(1);
                if budget <= EXTRA_PREFIX.chars().count() + 1 {
                    return None;
                }
                let line = truncate_at_word(&line, budget);
                remaining -= line.chars().count() + 1;
                Some(line)
            });

        let mut out = summary;
        for line in self.list_lines(snapshot).into_iter().flatten() {
            let cost = line.chars().count() + 1;
            if cost <= remaining {
                out.push('\n');
                out.push_str(&line);
                remaining -= cost;
            }
        }

        if let Some(line) = extra_line {
            out.push('\n');
            out.push_str(&line);
        }

        PromptContext(out)
    }

    fn summary_lines(&self, snapshot: &AggregateSnapshot) -> String {
        format!(
            "{}\nClientes: {} | Produtos: {} | Pedidos: {}\nVendas: {} | Ticket: {}",
            HEADER,
            snapshot.total_customers,
            snapshot.total_products,
            snapshot.total_orders,
            format_money(&self.currency_symbol, snapshot.completed_revenue),
            format_money(&self.currency_symbol, snapshot.average_order_value),
        )
    }

    fn list_lines(&self, snapshot: &AggregateSnapshot) -> [Option<String>; 3] {
        let customers = (!snapshot.recent_customers.is_empty()).then(|| {
            let names: Vec<&str> = snapshot
                .recent_customers
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            format!("Clientes recentes: {}", names.join(", "))
        });

        let orders = (!snapshot.recent_orders.is_empty()).then(|| {
            let tokens: Vec<String> = snapshot
                .recent_orders
                .iter()
                .map(|o| format!("#{}({}{})", o.id, self.currency_symbol, cents(o.total)))
                .collect();
            format!("Pedidos recentes: {}", tokens.join(", "))
        });

        let products = (!snapshot.top_stock_products.is_empty()).then(|| {
            let tokens: Vec<String> = snapshot
                .top_stock_products
                .iter()
                .map(|p| format!("{}({})", p.name, p.stock))
                .collect();
            format!("Produtos: {}", tokens.join(", "))
        });

        [customers, orders, products]
    }
}

/// Collapse newlines and runs of whitespace into single spaces.
fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary and
/// marking the cut with an ellipsis.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let head = truncate_chars(text, max_chars - 1);
    let cut = match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => head[..idx].trim_end(),
        _ => head.as_str(),
    };
    format!("{}{}", cut, ELLIPSIS)
}
