//! Subscription plans and customer subscriptions.

use atelie_core::{PlanId, SubscriptionId, UserId};
use tracing::instrument;

use super::types::{NewSubscription, Subscription, SubscriptionPlan};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Plans open for sign-up.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, ApiError> {
        self.get("/subscription-plans/active").await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown plans.
    #[instrument(skip(self))]
    pub async fn get_plan(&self, id: PlanId) -> Result<SubscriptionPlan, ApiError> {
        self.get(&format!("/subscription-plans/{id}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn user_subscriptions(&self, user_id: UserId) -> Result<Vec<Subscription>, ApiError> {
        self.get(&format!("/subscriptions/user/{user_id}")).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the subscription.
    #[instrument(skip(self, subscription), fields(plan_id = %subscription.plan_id))]
    pub async fn subscribe(
        &self,
        user_id: UserId,
        subscription: &NewSubscription,
    ) -> Result<Subscription, ApiError> {
        self.post(&format!("/subscriptions/user/{user_id}"), subscription)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn pause_subscription(&self, id: SubscriptionId) -> Result<(), ApiError> {
        self.patch_unit(&format!("/subscriptions/{id}/pause"), &()).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn resume_subscription(&self, id: SubscriptionId) -> Result<(), ApiError> {
        self.patch_unit(&format!("/subscriptions/{id}/resume"), &()).await
    }
}
