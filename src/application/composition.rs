//! The fixtures a test author actually uses
//!
//! Dependency order: `node` and `page` are leaves, `date` needs both, and
//! `wallet` needs the page. `node` and `page` are built from settings unless
//! a test provides them first.

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::clock_controller::ClockController;
use crate::application::fixtures::{Fixture, FixtureError, FixtureScope};
use crate::application::ports::{BlockchainNode, BrowserPage};
use crate::application::wallet::MockWallet;
use crate::infrastructure::{TestNodeClient, WebDriverPage};
use crate::Result;

/// Handle on the blockchain test node
pub struct NodeFixture;

#[async_trait]
impl Fixture for NodeFixture {
    type Output = Arc<dyn BlockchainNode>;
    const NAME: &'static str = "node";

    async fn setup(scope: &FixtureScope) -> Result<Self::Output> {
        let client = TestNodeClient::from_settings(&scope.settings().node)?;
        Ok(Arc::new(client))
    }
}

/// The browser page under test.
///
/// The browser is launched by the test harness; this only attaches to its
/// WebDriver session.
pub struct PageFixture;

#[async_trait]
impl Fixture for PageFixture {
    type Output = Arc<dyn BrowserPage>;
    const NAME: &'static str = "page";

    async fn setup(scope: &FixtureScope) -> Result<Self::Output> {
        let page = WebDriverPage::from_settings(&scope.settings().browser).ok_or_else(|| {
            FixtureError::Unavailable {
                fixture: Self::NAME,
                reason: "browser.session_id is not set and no page was provided".to_string(),
            }
        })??;
        Ok(Arc::new(page))
    }
}

pub struct DateFixture;

#[async_trait]
impl Fixture for DateFixture {
    type Output = ClockController;
    const NAME: &'static str = "date";

    async fn setup(scope: &FixtureScope) -> Result<ClockController> {
        let node = scope.resolve::<NodeFixture>().await?;
        let page = scope.resolve::<PageFixture>().await?;
        Ok(ClockController::from_settings(
            (*node).clone(),
            (*page).clone(),
            &scope.settings().clock,
        ))
    }
}

pub struct WalletFixture;

#[async_trait]
impl Fixture for WalletFixture {
    type Output = MockWallet;
    const NAME: &'static str = "wallet";

    async fn setup(scope: &FixtureScope) -> Result<MockWallet> {
        let page = scope.resolve::<PageFixture>().await?;
        Ok(MockWallet::new((*page).clone(), scope.settings().wallet.clone())?)
    }
}

/// Everything a synchronized-time test needs, set up in dependency order
pub struct TestFixtures {
    scope: FixtureScope,
    date: Arc<ClockController>,
    wallet: Arc<MockWallet>,
    node: Arc<Arc<dyn BlockchainNode>>,
    page: Arc<Arc<dyn BrowserPage>>,
}

impl TestFixtures {
    /// Resolve every fixture; on failure, whatever was already set up is
    /// torn down before the error is returned.
    pub async fn setup(scope: FixtureScope) -> Result<Self> {
        match Self::resolve_all(&scope).await {
            Ok((date, wallet, node, page)) => Ok(Self {
                scope,
                date,
                wallet,
                node,
                page,
            }),
            Err(error) => Err(scope.abandon_setup(error).await),
        }
    }

    #[allow(clippy::type_complexity)]
    async fn resolve_all(
        scope: &FixtureScope,
    ) -> Result<(
        Arc<ClockController>,
        Arc<MockWallet>,
        Arc<Arc<dyn BlockchainNode>>,
        Arc<Arc<dyn BrowserPage>>,
    )> {
        let date = scope.resolve::<DateFixture>().await?;
        let wallet = scope.resolve::<WalletFixture>().await?;
        let node = scope.resolve::<NodeFixture>().await?;
        let page = scope.resolve::<PageFixture>().await?;
        Ok((date, wallet, node, page))
    }

    pub fn date(&self) -> &ClockController {
        &self.date
    }

    pub fn wallet(&self) -> &MockWallet {
        &self.wallet
    }

    pub fn node(&self) -> Arc<dyn BlockchainNode> {
        (*self.node).clone()
    }

    pub fn page(&self) -> Arc<dyn BrowserPage> {
        (*self.page).clone()
    }

    pub async fn teardown(self) -> Result<()> {
        self.scope.teardown().await
    }
}
