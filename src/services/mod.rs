// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod directory;
pub mod fanout;
pub mod gate;
pub mod google_oidc;
pub mod identity;
pub mod jwks;
pub mod lifecycle;
pub mod locks;
pub mod notify;
pub mod payments;
pub mod tasks;

pub use directory::{AccountDirectory, IdentityToolkitDirectory, MemoryDirectory};
pub use gate::{DataCall, Gate};
pub use google_oidc::{GoogleOidcVerifier, VerifiedTaskPrincipal};
pub use identity::{IdentityClaims, IdentityVerifier};
pub use lifecycle::LifecycleEngine;
pub use notify::{LogNotifier, Notifier};
pub use payments::PaymentProcessor;
pub use tasks::{InlineQueue, PaymentTrigger, TasksService, TriggerQueue};
