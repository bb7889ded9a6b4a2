//! Recording fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::bridge::{
    BackgroundMessenger, BackgroundRequest, BlockingState, Identity, SecureChannelBridge,
    UserData, VaultClient,
};
use crate::connection::ConnectionRetryController;
use crate::error::{BridgeError, VaultError};
use crate::pairing::{PairSuccessHandler, PairingCoordinator};
use crate::surface::{Modal, ModalPresentation, Route, Surface};

pub fn identity(signing: &str, agreement: &str) -> Identity {
    Identity {
        signing_public_key: signing.to_string(),
        agreement_public_key: agreement.to_string(),
        fingerprint: None,
    }
}

pub fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

/// Scripted bridge that records every call by name.
pub struct FakeBridge {
    blocking: Mutex<VecDeque<Result<Option<BlockingState>, BridgeError>>>,
    identities: Mutex<VecDeque<Result<Identity, BridgeError>>>,
    keystore: Mutex<Option<BridgeError>>,
    confirm: Mutex<Result<bool, BridgeError>>,
    pin: Mutex<Result<bool, BridgeError>>,
    calls: Mutex<Vec<&'static str>>,
    pinned: Mutex<Vec<Identity>>,
    tokens: Mutex<Vec<String>>,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self {
            blocking: Mutex::new(VecDeque::new()),
            identities: Mutex::new(VecDeque::new()),
            keystore: Mutex::new(None),
            confirm: Mutex::new(Ok(true)),
            pin: Mutex::new(Ok(true)),
            calls: Mutex::new(Vec::new()),
            pinned: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn push_blocking(&self, reply: Result<Option<BlockingState>, BridgeError>) {
        self.blocking.lock().unwrap().push_back(reply);
    }

    pub fn push_identity(&self, reply: Result<Identity, BridgeError>) {
        self.identities.lock().unwrap().push_back(reply);
    }

    pub fn fail_keystore(&self, err: BridgeError) {
        *self.keystore.lock().unwrap() = Some(err);
    }

    pub fn set_confirm(&self, reply: Result<bool, BridgeError>) {
        *self.confirm.lock().unwrap() = reply;
    }

    pub fn set_pin(&self, reply: Result<bool, BridgeError>) {
        *self.pin.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn pinned(&self) -> Vec<Identity> {
        self.pinned.lock().unwrap().clone()
    }

    /// Tokens passed to `get_identity`, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl SecureChannelBridge for FakeBridge {
    async fn get_blocking_state(&self) -> Result<Option<BlockingState>, BridgeError> {
        self.record("get_blocking_state");
        self.blocking.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn get_identity(&self, token: &str) -> Result<Identity, BridgeError> {
        self.record("get_identity");
        self.tokens.lock().unwrap().push(token.to_string());
        self.identities
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::Transport("no identity scripted".into())))
    }

    async fn confirm_pair(&self) -> Result<bool, BridgeError> {
        self.record("confirm_pair");
        self.confirm.lock().unwrap().clone()
    }

    async fn pin_identity(&self, identity: &Identity) -> Result<bool, BridgeError> {
        self.record("pin_identity");
        let reply = self.pin.lock().unwrap().clone();
        if matches!(reply, Ok(true)) {
            self.pinned.lock().unwrap().push(identity.clone());
        }
        reply
    }

    async fn unpair(&self) -> Result<(), BridgeError> {
        self.record("unpair");
        Ok(())
    }

    async fn unlock_client_keystore(&self, _password: &SecretString) -> Result<(), BridgeError> {
        self.record("unlock_client_keystore");
        match self.keystore.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Vault client whose login state follows `log_in` and `reset_state`.
pub struct FakeVault {
    logged_in: Mutex<bool>,
    login_error: Mutex<Option<VaultError>>,
    init_error: Mutex<Option<VaultError>>,
    sync_error: Mutex<Option<VaultError>>,
    calls: Mutex<Vec<&'static str>>,
    passwords: Mutex<Vec<String>>,
}

impl FakeVault {
    pub fn new() -> Self {
        Self {
            logged_in: Mutex::new(false),
            login_error: Mutex::new(None),
            init_error: Mutex::new(None),
            sync_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            passwords: Mutex::new(Vec::new()),
        }
    }

    pub fn set_logged_in(&self, value: bool) {
        *self.logged_in.lock().unwrap() = value;
    }

    pub fn fail_login(&self, err: VaultError) {
        *self.login_error.lock().unwrap() = Some(err);
    }

    pub fn fail_init(&self, err: VaultError) {
        *self.init_error.lock().unwrap() = Some(err);
    }

    pub fn fail_sync(&self, err: VaultError) {
        *self.sync_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn passwords(&self) -> Vec<String> {
        self.passwords.lock().unwrap().clone()
    }
}

#[async_trait]
impl VaultClient for FakeVault {
    async fn log_in(&self, password: &SecretString) -> Result<(), VaultError> {
        self.calls.lock().unwrap().push("log_in");
        self.passwords
            .lock()
            .unwrap()
            .push(password.expose_secret().to_string());
        if let Some(err) = self.login_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.set_logged_in(true);
        Ok(())
    }

    async fn init_vaults(&self, _password: &SecretString) -> Result<(), VaultError> {
        self.calls.lock().unwrap().push("init_vaults");
        match self.init_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn sync_vault(&self) -> Result<(), VaultError> {
        self.calls.lock().unwrap().push("sync_vault");
        match self.sync_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn user_data(&self) -> Result<UserData, VaultError> {
        self.calls.lock().unwrap().push("user_data");
        Ok(UserData {
            is_logged_in: *self.logged_in.lock().unwrap(),
        })
    }

    async fn reset_state(&self) {
        self.calls.lock().unwrap().push("reset_state");
        self.set_logged_in(false);
    }
}

/// Everything a surface was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Notify(String),
    OpenModal(&'static str),
    CloseAllModals,
    Navigate(Route),
    Loading(bool),
}

pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
    modals: Mutex<Vec<Modal>>,
    presentations: Mutex<Vec<ModalPresentation>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            modals: Mutex::new(Vec::new()),
            presentations: Mutex::new(Vec::new()),
        }
    }

    /// How each opened modal asked to be shown, in open order.
    pub fn presentations(&self) -> Vec<ModalPresentation> {
        self.presentations.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Notify(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn last_notification(&self) -> Option<String> {
        self.notifications().pop()
    }

    pub fn opened(&self, name: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::OpenModal(n) if *n == name))
            .count()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Navigate(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn pairing_coordinator(&self) -> Option<PairingCoordinator> {
        self.modals.lock().unwrap().iter().rev().find_map(|m| match m {
            Modal::Pairing(c) => Some(c.clone()),
            _ => None,
        })
    }

    pub fn connection_controller(&self) -> Option<ConnectionRetryController> {
        self.modals.lock().unwrap().iter().rev().find_map(|m| match m {
            Modal::Connection(c) => Some(c.clone()),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn notify(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(SurfaceEvent::Notify(message.to_string()));
    }

    fn open_modal(&self, modal: Modal) {
        self.events
            .lock()
            .unwrap()
            .push(SurfaceEvent::OpenModal(modal.name()));
        self.presentations.lock().unwrap().push(modal.presentation());
        self.modals.lock().unwrap().push(modal);
    }

    fn close_all_modals(&self) {
        self.events.lock().unwrap().push(SurfaceEvent::CloseAllModals);
    }

    fn navigate(&self, route: Route) {
        self.events.lock().unwrap().push(SurfaceEvent::Navigate(route));
    }

    fn set_loading(&self, loading: bool) {
        self.events.lock().unwrap().push(SurfaceEvent::Loading(loading));
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<BackgroundRequest>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<BackgroundRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.sent()
            .iter()
            .filter(|r| **r == BackgroundRequest::ResetTimer)
            .count()
    }
}

impl BackgroundMessenger for RecordingMessenger {
    fn send(&self, request: BackgroundRequest) {
        self.sent.lock().unwrap().push(request);
    }
}

#[derive(Default)]
pub struct CountingSuccess {
    count: AtomicUsize,
}

impl CountingSuccess {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PairSuccessHandler for CountingSuccess {
    async fn on_pair_success(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
