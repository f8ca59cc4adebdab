use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// A store or warehouse. Products, jobs and point ledgers are scoped to a site.
    SiteId
);
uuid_id!(
    /// A warehouse job (putaway, pick, pack, dispatch, transfer).
    JobId
);
uuid_id!(
    /// A site-scoped product record.
    ProductId
);
uuid_id!(EmployeeId);
uuid_id!(AssignmentId);
uuid_id!(SaleId);
uuid_id!(TransferId);
uuid_id!(PurchaseOrderId);
uuid_id!(
    /// An entry in the points transaction journal.
    TransactionId
);

impl JobId {
    /// Derives a stable job id from an idempotency key.
    ///
    /// The same key always yields the same id, so re-delivering a creation
    /// request lands on the already stored job instead of a second one.
    pub fn derived(key: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
    }
}

/// Link from a job back to the order-like record that seeded its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OrderRef {
    Sale(SaleId),
    Transfer(TransferId),
    PurchaseOrder(PurchaseOrderId),
}

impl OrderRef {
    /// Returns the kind of order as a string.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderRef::Sale(_) => "sale",
            OrderRef::Transfer(_) => "transfer",
            OrderRef::PurchaseOrder(_) => "purchase_order",
        }
    }

    /// Returns the referenced record's UUID.
    pub fn as_uuid(&self) -> Uuid {
        match self {
            OrderRef::Sale(id) => id.as_uuid(),
            OrderRef::Transfer(id) => id.as_uuid(),
            OrderRef::PurchaseOrder(id) => id.as_uuid(),
        }
    }

    /// Short uppercase fragment used in human-facing job numbers.
    pub fn short_code(&self) -> String {
        let simple = self.as_uuid().simple().to_string();
        simple[..8].to_ascii_uppercase()
    }
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_uuid())
    }
}
