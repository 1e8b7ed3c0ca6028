use serde::{Deserialize, Serialize};

/// Order status lifecycle.
///
/// Numeric codes are shared with the marketplace integration and with
/// client-side filters, so they are part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Draft created at the terminal (1).
    Created,
    /// Sent to the marketplace (2).
    Published,
    /// Handed over to an executor (3).
    TransferredToExecutor,
    /// Work done (4).
    Completed,
    /// Work not done (5).
    NotCompleted,
    /// Cancelled (6).
    Cancelled,
    /// Reserved by an executor (7).
    AssignedToExecutor,
}

impl OrderStatus {
    pub const SUCCESSFUL: [OrderStatus; 4] = [
        OrderStatus::Published,
        OrderStatus::TransferredToExecutor,
        OrderStatus::Completed,
        OrderStatus::AssignedToExecutor,
    ];
    pub const UNSUCCESSFUL: [OrderStatus; 2] = [OrderStatus::NotCompleted, OrderStatus::Cancelled];

    pub fn code(self) -> u8 {
        match self {
            OrderStatus::Created => 1,
            OrderStatus::Published => 2,
            OrderStatus::TransferredToExecutor => 3,
            OrderStatus::Completed => 4,
            OrderStatus::NotCompleted => 5,
            OrderStatus::Cancelled => 6,
            OrderStatus::AssignedToExecutor => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => OrderStatus::Created,
            2 => OrderStatus::Published,
            3 => OrderStatus::TransferredToExecutor,
            4 => OrderStatus::Completed,
            5 => OrderStatus::NotCompleted,
            6 => OrderStatus::Cancelled,
            7 => OrderStatus::AssignedToExecutor,
            _ => return None,
        })
    }

    /// Map a marketplace task status onto the terminal lifecycle.
    pub fn from_marketplace_code(code: &str) -> Option<Self> {
        Some(match code.trim() {
            "0" | "1" => OrderStatus::Published,
            "2" => OrderStatus::TransferredToExecutor,
            "3" => OrderStatus::Completed,
            "4" => OrderStatus::NotCompleted,
            "5" => OrderStatus::Cancelled,
            "7" => OrderStatus::AssignedToExecutor,
            _ => return None,
        })
    }

    /// Status title shown in lists and exports.
    pub fn title(self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Published => "Published",
            OrderStatus::TransferredToExecutor => "Transferred to executor",
            OrderStatus::Completed => "Completed",
            OrderStatus::NotCompleted => "Not completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::AssignedToExecutor => "Assigned to executor",
        }
    }

    /// Final statuses: no further marketplace-driven transitions.
    pub fn is_closed(self) -> bool {
        matches!(self, OrderStatus::NotCompleted | OrderStatus::Cancelled)
    }

    pub fn is_draft(self) -> bool {
        self == OrderStatus::Created
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 1..=7 {
            assert_eq!(OrderStatus::from_code(code).unwrap().code(), code);
        }
        assert_eq!(OrderStatus::from_code(8), None);
    }

    #[test]
    fn marketplace_open_and_responded_both_mean_published() {
        assert_eq!(OrderStatus::from_marketplace_code("0"), Some(OrderStatus::Published));
        assert_eq!(OrderStatus::from_marketplace_code("1"), Some(OrderStatus::Published));
        assert_eq!(OrderStatus::from_marketplace_code("3"), Some(OrderStatus::Completed));
        assert_eq!(OrderStatus::from_marketplace_code("6"), None);
    }
}
