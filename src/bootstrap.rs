use std::sync::Arc;

use crate::{
    api::{Account, RegistrationRequest},
    executor::BatchExecutor,
    operation::RemoteOperation,
};

const PASSWORD: &str = "Un1x_Generated";
const VERIFICATION_CODE: &str = "12345";
const AVATAR_ID: u32 = 1;

impl RegistrationRequest {
    /// A throwaway registration for `slot` of a batch stamped `stamp`.
    ///
    /// All requests of one batch share the stamp, so the slot keeps them apart;
    /// the stamp has a fixed width for any realistic clock, which keeps keys
    /// from different batches apart as well.
    pub fn synthetic(stamp: i64, slot: usize) -> Self {
        let key = format!("unix{stamp}{slot}");
        Self {
            email: format!("{key}@gmail.com"),
            username: key,
            password: PASSWORD.to_string(),
            avatar_id: AVATAR_ID,
            verification_code: VERIFICATION_CODE.to_string(),
            referral_code: String::new(),
        }
    }
}

/// Registers `count` fresh accounts and returns the ones that were created.
///
/// Failed registrations are dropped without retrying, so the result may be
/// shorter than `count`. Successful accounts keep the relative order of their
/// slots, but their positions do not line up with the original slots: callers
/// must identify an account by its contents, never by its index.
pub async fn bootstrap<Op>(
    count: usize,
    executor: &BatchExecutor,
    operation: &Arc<Op>,
) -> Vec<Account>
where
    Op: RemoteOperation<RegistrationRequest> + 'static,
    Op::Output: Into<Account>,
{
    if count == 0 {
        tracing::warn!("Asked to register zero accounts, nothing to do.");
        return Vec::new();
    }

    let stamp = chrono::Utc::now().timestamp();
    let requests: Vec<RegistrationRequest> = (0..count)
        .map(|slot| RegistrationRequest::synthetic(stamp, slot))
        .collect();

    tracing::info!(count, "Registering accounts...");
    let result = executor.execute(requests, operation).await;

    for outcome in &result.outcomes {
        if let Some(e) = outcome.error() {
            let slot = outcome.slot;
            tracing::warn!(slot, error = %e, "Registration failed, dropping account.");
        }
    }

    let accounts: Vec<Account> = result
        .outcomes
        .into_iter()
        .filter_map(|o| o.into_value())
        .map(Into::into)
        .collect();

    tracing::info!(
        registered = accounts.len(),
        failed = result.stats.failure_count,
        wall_clock = ?result.wall_clock,
        summed = ?result.stats.summed_duration,
        "Accounts registered"
    );
    accounts
}
