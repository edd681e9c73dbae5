//! Group ledger: subscription groups, memberships, payments, the activity
//! feed and the waitlist.
//!
//! A group's host occupies one seat; `remaining_spaces` counts the seats
//! still open to other members and never exceeds `max_members - 1`.

use crate::{
    catalog::Catalog,
    clock::Clock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{self, LedgerStore},
    types::{new_id, EntityId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed TEXT enums: lowercase `as_str()` and a matching `FromStr`.
macro_rules! lower_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($name), " '{}'"), other)),
                }
            }
        }
    };
}

lower_enum!(GroupStatus { Active => "active", Inactive => "inactive" });
lower_enum!(MemberStatus { Active => "active", Inactive => "inactive" });
lower_enum!(PaymentStatus { Pending => "pending", Completed => "completed", Failed => "failed" });
lower_enum!(ActivityKind { Payment => "payment", Invite => "invite", Join => "join", Leave => "leave" });
lower_enum!(WaitlistStatus { Pending => "pending", Notified => "notified", Joined => "joined" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionGroup {
    pub id:               EntityId,
    pub name:             String,
    pub description:      Option<String>,
    pub max_members:      u32,
    pub price:            f64,
    pub status:           GroupStatus,
    pub host_id:          UserId,
    pub remaining_spaces: u32,
    pub location:         String,
    pub created_at:       Timestamp,
    pub updated_at:       Timestamp,
}

impl SubscriptionGroup {
    /// Even split of the price across every seat.
    pub fn member_share(&self) -> f64 {
        self.price / self.max_members as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMember {
    pub id:        EntityId,
    pub user_id:   UserId,
    pub group_id:  EntityId,
    pub share:     f64,
    pub status:    MemberStatus,
    pub joined_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id:         EntityId,
    pub amount:     f64,
    pub status:     PaymentStatus,
    pub user_id:    UserId,
    pub group_id:   EntityId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id:          EntityId,
    pub kind:        ActivityKind,
    pub description: String,
    pub user_id:     UserId,
    pub group_id:    Option<EntityId>,
    pub amount:      Option<f64>,
    pub created_at:  Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub kind:        ActivityKind,
    pub description: String,
    pub user_id:     UserId,
    pub group_id:    Option<EntityId>,
    pub amount:      Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestContact {
    pub name:  String,
    pub email: String,
    pub phone: String,
}

/// Either a signed-in user waiting on a specific group, or a guest waiting
/// on a catalog plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id:          EntityId,
    pub group_id:    Option<EntityId>,
    pub user_id:     Option<UserId>,
    pub provider_id: Option<String>,
    pub plan_id:     Option<String>,
    pub guest:       Option<GuestContact>,
    pub status:      WaitlistStatus,
    pub created_at:  Timestamp,
}

pub struct GroupLedger<'a> {
    store:   &'a LedgerStore,
    catalog: Catalog<'a>,
    clock:   &'a dyn Clock,
}

impl<'a> GroupLedger<'a> {
    pub fn new(store: &'a LedgerStore, catalog: Catalog<'a>, clock: &'a dyn Clock) -> Self {
        Self { store, catalog, clock }
    }

    // ── Groups ─────────────────────────────────────────────────────

    /// Open a group for a catalog plan with `remaining_spaces` seats offered
    /// to other members.
    pub fn create_group(
        &self,
        host_id: &str,
        provider_id: &str,
        plan_id: &str,
        remaining_spaces: u32,
        location: &str,
    ) -> LedgerResult<SubscriptionGroup> {
        let (provider, plan) = self.catalog.plan(provider_id, plan_id).ok_or_else(|| {
            LedgerError::InvalidGroup { reason: format!("unknown plan {provider_id}/{plan_id}") }
        })?;

        let max_open = plan.max_members.saturating_sub(1);
        if remaining_spaces == 0 || remaining_spaces > max_open {
            return Err(LedgerError::InvalidGroup {
                reason: format!("remaining spaces must be between 1 and {max_open}, got {remaining_spaces}"),
            });
        }
        let location = location.trim();
        if location.is_empty() {
            return Err(LedgerError::InvalidGroup { reason: "location is required".into() });
        }

        let now = self.clock.now();
        let name = format!("{} {}", provider.name, plan.name);
        let group = SubscriptionGroup {
            id:               new_id(),
            name:             name.clone(),
            description:      Some(format!("{} (Location: {location})", plan.description)),
            max_members:      plan.max_members,
            price:            plan.price,
            status:           GroupStatus::Active,
            host_id:          host_id.to_string(),
            remaining_spaces,
            location:         location.to_string(),
            created_at:       now,
            updated_at:       now,
        };

        self.store.atomically(|store| {
            store.insert_group(&group)?;
            store.insert_activity(&Activity {
                id:          new_id(),
                kind:        ActivityKind::Join,
                description: format!("Created {name} group in {location}"),
                user_id:     host_id.to_string(),
                group_id:    Some(group.id.clone()),
                amount:      None,
                created_at:  now,
            })?;
            store.append_event(
                &LedgerEvent::GroupCreated { group_id: group.id.clone(), host_id: host_id.to_string() },
                &now,
            )
        })?;

        log::info!("Group {} ({name}) opened by {host_id} with {remaining_spaces} spaces", group.id);
        Ok(group)
    }

    pub fn get_group(&self, group_id: &str) -> LedgerResult<SubscriptionGroup> {
        self.store
            .group(group_id)?
            .ok_or_else(|| LedgerError::not_found("Group", group_id))
    }

    /// Groups the user holds an active membership in.
    pub fn user_groups(&self, user_id: &str) -> LedgerResult<Vec<SubscriptionGroup>> {
        self.store.groups_for_member(user_id)
    }

    // ── Members ────────────────────────────────────────────────────

    pub fn join_group(&self, user_id: &str, group_id: &str, share: f64) -> LedgerResult<SubscriptionMember> {
        let member = self.store.atomically(|store| {
            let group = store
                .group(group_id)?
                .ok_or_else(|| LedgerError::not_found("Group", group_id))?;
            if group.status != GroupStatus::Active {
                return Err(LedgerError::InvalidGroup { reason: format!("group {group_id} is inactive") });
            }
            if group.host_id == user_id {
                return Err(LedgerError::InvalidGroup { reason: "the host already holds a seat".into() });
            }
            if store.take_space(group_id)? == 0 {
                return Err(LedgerError::GroupFull { group_id: group_id.to_string() });
            }

            let now = self.clock.now();
            let member = SubscriptionMember {
                id:        new_id(),
                user_id:   user_id.to_string(),
                group_id:  group_id.to_string(),
                share,
                status:    MemberStatus::Active,
                joined_at: now,
            };
            match store.insert_member(&member) {
                Ok(()) => {}
                Err(e) if store::is_unique_violation(&e) => {
                    return Err(LedgerError::InvalidGroup {
                        reason: format!("{user_id} is already a member of {group_id}"),
                    });
                }
                Err(e) => return Err(e),
            }
            store.insert_activity(&Activity {
                id:          new_id(),
                kind:        ActivityKind::Join,
                description: format!("Joined {}", group.name),
                user_id:     user_id.to_string(),
                group_id:    Some(group_id.to_string()),
                amount:      Some(share),
                created_at:  now,
            })?;
            store.append_event(
                &LedgerEvent::MemberJoined { group_id: group_id.to_string(), user_id: user_id.to_string(), share },
                &now,
            )?;
            Ok(member)
        })?;

        log::info!("{user_id} joined group {group_id} at {share:.2}/month");
        Ok(member)
    }

    pub fn leave_group(&self, user_id: &str, group_id: &str) -> LedgerResult<()> {
        self.store.atomically(|store| {
            let group = store
                .group(group_id)?
                .ok_or_else(|| LedgerError::not_found("Group", group_id))?;
            if store.deactivate_member(user_id, group_id)? == 0 {
                return Err(LedgerError::not_found("Membership", format!("{user_id}@{group_id}")));
            }
            store.release_space(group_id)?;

            let now = self.clock.now();
            store.insert_activity(&Activity {
                id:          new_id(),
                kind:        ActivityKind::Leave,
                description: format!("Left {}", group.name),
                user_id:     user_id.to_string(),
                group_id:    Some(group_id.to_string()),
                amount:      None,
                created_at:  now,
            })?;
            store.append_event(
                &LedgerEvent::MemberLeft { group_id: group_id.to_string(), user_id: user_id.to_string() },
                &now,
            )
        })?;
        log::info!("{user_id} left group {group_id}");
        Ok(())
    }

    pub fn group_members(&self, group_id: &str) -> LedgerResult<Vec<SubscriptionMember>> {
        self.store.active_members(group_id)
    }

    // ── Payments ───────────────────────────────────────────────────

    /// Record a payment row. No money moves; settlement happens elsewhere.
    pub fn create_payment(
        &self,
        user_id: &str,
        group_id: &str,
        amount: f64,
        status: PaymentStatus,
    ) -> LedgerResult<Payment> {
        let now = self.clock.now();
        let payment = Payment {
            id:         new_id(),
            amount,
            status,
            user_id:    user_id.to_string(),
            group_id:   group_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.atomically(|store| {
            let group = store
                .group(group_id)?
                .ok_or_else(|| LedgerError::not_found("Group", group_id))?;
            store.insert_payment(&payment)?;
            store.insert_activity(&Activity {
                id:          new_id(),
                kind:        ActivityKind::Payment,
                description: format!("Payment for {}", group.name),
                user_id:     user_id.to_string(),
                group_id:    Some(group_id.to_string()),
                amount:      Some(amount),
                created_at:  now,
            })?;
            store.append_event(
                &LedgerEvent::PaymentRecorded {
                    payment_id: payment.id.clone(),
                    group_id:   group_id.to_string(),
                    amount,
                },
                &now,
            )
        })?;
        Ok(payment)
    }

    pub fn group_payments(&self, group_id: &str) -> LedgerResult<Vec<Payment>> {
        self.store.payments_for_group(group_id)
    }

    // ── Activity feed ──────────────────────────────────────────────

    pub fn create_activity(&self, new: NewActivity) -> LedgerResult<Activity> {
        let activity = Activity {
            id:          new_id(),
            kind:        new.kind,
            description: new.description,
            user_id:     new.user_id,
            group_id:    new.group_id,
            amount:      new.amount,
            created_at:  self.clock.now(),
        };
        self.store.atomically(|store| {
            store.insert_activity(&activity)?;
            store.append_event(
                &LedgerEvent::ActivityRecorded {
                    activity_id: activity.id.clone(),
                    user_id:     activity.user_id.clone(),
                },
                &activity.created_at,
            )
        })?;
        Ok(activity)
    }

    /// Newest first.
    pub fn user_activities(&self, user_id: &str) -> LedgerResult<Vec<Activity>> {
        self.store.activities_for_user(user_id)
    }

    // ── Waitlist ───────────────────────────────────────────────────

    /// Queue a signed-in user for a seat in `group_id`. Joining twice returns
    /// the existing entry.
    pub fn join_waitlist(&self, group_id: &str, user_id: &str) -> LedgerResult<WaitlistEntry> {
        let entry = WaitlistEntry {
            id:          new_id(),
            group_id:    Some(group_id.to_string()),
            user_id:     Some(user_id.to_string()),
            provider_id: None,
            plan_id:     None,
            guest:       None,
            status:      WaitlistStatus::Pending,
            created_at:  self.clock.now(),
        };
        match self.insert_waitlist_entry(&entry) {
            Ok(()) => Ok(entry),
            Err(e) if store::is_unique_violation(&e) => self
                .store
                .waitlist_entry(group_id, user_id)?
                .ok_or_else(|| LedgerError::not_found("Waitlist entry", format!("{user_id}@{group_id}"))),
            Err(e) => Err(e),
        }
    }

    /// Queue a guest for any group on a catalog plan.
    pub fn register_guest_waitlist(
        &self,
        provider_id: &str,
        plan_id: &str,
        contact: GuestContact,
    ) -> LedgerResult<WaitlistEntry> {
        if self.catalog.plan(provider_id, plan_id).is_none() {
            return Err(LedgerError::InvalidGroup { reason: format!("unknown plan {provider_id}/{plan_id}") });
        }
        if contact.email.trim().is_empty() {
            return Err(LedgerError::InvalidGroup { reason: "guest email is required".into() });
        }
        let entry = WaitlistEntry {
            id:          new_id(),
            group_id:    None,
            user_id:     None,
            provider_id: Some(provider_id.to_string()),
            plan_id:     Some(plan_id.to_string()),
            guest:       Some(contact),
            status:      WaitlistStatus::Pending,
            created_at:  self.clock.now(),
        };
        self.insert_waitlist_entry(&entry)?;
        Ok(entry)
    }

    pub fn waitlist_status(&self, group_id: &str, user_id: &str) -> LedgerResult<Option<WaitlistStatus>> {
        Ok(self.store.waitlist_entry(group_id, user_id)?.map(|e| e.status))
    }

    pub fn waitlist_count(&self, group_id: &str) -> LedgerResult<u32> {
        self.store.waitlist_count(group_id)
    }

    fn insert_waitlist_entry(&self, entry: &WaitlistEntry) -> LedgerResult<()> {
        self.store.atomically(|store| {
            store.insert_waitlist_entry(entry)?;
            store.append_event(&LedgerEvent::WaitlistJoined { entry_id: entry.id.clone() }, &entry.created_at)
        })
    }
}
