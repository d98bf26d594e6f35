//! Relative ordering of plugins and configuration sources.
//!
//! Three schemes compete when ordering extension instances:
//!
//! 1. **Priority-ordered** values always sort ahead of everything else.
//! 2. **Explicit order** values sort by ascending value.
//! 3. **Unordered** values take the lowest precedence.
//!
//! Ties keep their original (declaration) order because every sort in this
//! module is stable.

/// Order value of the element that must come first.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Order value assumed for elements that declare no order.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// The ordering hint attached to a plugin or configuration source.
#[derive(Debug, Clone, Copy, Default)]
pub struct Order {
    priority: bool,
    value: Option<i32>,
}

impl Order {
    /// No declared order; sorts last.
    pub const fn unordered() -> Self {
        Self {
            priority: false,
            value: None,
        }
    }

    /// An explicit order value.
    pub const fn of(value: i32) -> Self {
        Self {
            priority: false,
            value: Some(value),
        }
    }

    /// A priority-ordered value; sorts ahead of every non-priority order.
    pub const fn priority(value: i32) -> Self {
        Self {
            priority: true,
            value: Some(value),
        }
    }

    /// Builds an order from an optional explicit value.
    pub fn from_value(value: Option<i32>) -> Self {
        value.map(Self::of).unwrap_or_default()
    }

    pub fn is_priority(&self) -> bool {
        self.priority
    }

    /// The effective numeric value, `LOWEST_PRECEDENCE` when undeclared.
    pub fn value(&self) -> i32 {
        self.value.unwrap_or(LOWEST_PRECEDENCE)
    }

    fn sort_key(&self) -> (bool, i32) {
        (!self.priority, self.value())
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Order {}

impl PartialOrd for Order {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Order {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Stable sort of `items` by the order each one reports.
pub fn sort_by_order<T>(items: &mut [T], order_of: impl Fn(&T) -> Order) {
    items.sort_by_key(|item| order_of(item));
}
