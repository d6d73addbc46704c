#![allow(dead_code)]

use ocvpn_core::config::SessionConfig;
use ocvpn_core::error::SessionError;
use ocvpn_core::vpn::{
    AuthForm, ConnectionHandle, ConnectionState, CredentialPrompter, EngineFactory, EngineHooks,
    FormField, FormFieldKind, FormResult, HostNetwork, IpConfig, ProgressLevel, RoutePlan,
    ServiceEndpoint, SessionService, StateMessage, StateStream, TunnelEngine,
};
use std::fs::File;
use std::io;
use std::os::fd::{OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Return codes and data a [`MockEngine`] plays back
#[derive(Debug, Clone)]
pub struct EngineScript {
    pub target_code: i32,
    /// Forms presented, in order, from `obtain_auth_cookie`
    pub forms: Vec<AuthForm>,
    /// Returned by `obtain_auth_cookie` once every form was filled
    pub cookie_code: i32,
    pub channel_code: i32,
    pub dtls_code: i32,
    pub attach_code: i32,
    /// Number of successful loop steps before the loop ends; `None`
    /// keeps the loop running until the session is cancelled
    pub loop_steps: Option<usize>,
    pub ip: Option<IpConfig>,
    /// Sockets handed to the protect hook before authentication
    pub protect_fds: Vec<RawFd>,
}

impl Default for EngineScript {
    fn default() -> Self {
        Self {
            target_code: 0,
            forms: vec![login_form()],
            cookie_code: 0,
            channel_code: 0,
            dtls_code: 0,
            attach_code: 0,
            loop_steps: Some(0),
            ip: Some(ip_config()),
            protect_fds: Vec::new(),
        }
    }
}

/// What the mock engines did, shared across all instances of a factory
#[derive(Debug, Default)]
pub struct EngineRecord {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub filled_forms: Mutex<Vec<AuthForm>>,
}

impl EngineRecord {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

pub struct MockEngine {
    hooks: EngineHooks,
    script: EngineScript,
    record: Arc<EngineRecord>,
    steps: usize,
}

impl TunnelEngine for MockEngine {
    fn parse_target(&mut self, target: &str) -> i32 {
        self.record.call(&format!("parse_target {}", target));
        self.script.target_code
    }

    fn obtain_auth_cookie(&mut self) -> i32 {
        self.record.call("obtain_auth_cookie");
        for fd in &self.script.protect_fds {
            self.hooks.protect_socket(*fd);
        }
        self.hooks.progress(ProgressLevel::Info, "Connected to gateway\n");

        for form in &self.script.forms {
            let mut form = form.clone();
            let result = self.hooks.process_auth_form(&mut form);
            self.record.filled_forms.lock().unwrap().push(form);
            match result {
                FormResult::Ok => {}
                FormResult::Cancelled => return 1,
                FormResult::Error => return -1,
            }
        }
        self.script.cookie_code
    }

    fn establish_secure_channel(&mut self) -> i32 {
        self.record.call("establish_secure_channel");
        self.script.channel_code
    }

    fn setup_dtls(&mut self, _attempt_period: Duration) -> i32 {
        self.record.call("setup_dtls");
        self.script.dtls_code
    }

    fn attach_tunnel_device(&mut self, _fd: RawFd) -> i32 {
        self.record.call("attach_tunnel_device");
        self.script.attach_code
    }

    fn run_loop_step(&mut self, _timeout: Duration, _reconnect_interval: Duration) -> i32 {
        match self.script.loop_steps {
            Some(limit) if self.steps >= limit => -1,
            Some(_) => {
                self.steps += 1;
                0
            }
            None => {
                std::thread::sleep(Duration::from_millis(5));
                0
            }
        }
    }

    fn ip_config(&self) -> Option<IpConfig> {
        self.script.ip.clone()
    }

    fn destroy(&mut self) {
        self.record.call("destroy");
        self.record.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockFactory {
    pub script: EngineScript,
    pub record: Arc<EngineRecord>,
}

impl MockFactory {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            record: Arc::new(EngineRecord::default()),
        }
    }
}

impl EngineFactory for MockFactory {
    fn create(&self, hooks: EngineHooks) -> Result<Box<dyn TunnelEngine>, SessionError> {
        self.record.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockEngine {
            hooks,
            script: self.script.clone(),
            record: self.record.clone(),
            steps: 0,
        }))
    }
}

/// Host that hands out `/dev/null` as the tunnel device
#[derive(Debug)]
pub struct MockHost {
    pub protect_succeeds: AtomicBool,
    pub plans: Mutex<Vec<RoutePlan>>,
    pub protected: Mutex<Vec<RawFd>>,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
    /// `"started"`/`"finished"` in the order the markers were touched
    pub markers: Mutex<Vec<&'static str>>,
    /// Delay inside `session_finished`
    pub finish_delay: Mutex<Duration>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            protect_succeeds: AtomicBool::new(true),
            plans: Mutex::new(Vec::new()),
            protected: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            markers: Mutex::new(Vec::new()),
            finish_delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl HostNetwork for MockHost {
    fn establish(&self, plan: &RoutePlan) -> io::Result<OwnedFd> {
        self.plans.lock().unwrap().push(plan.clone());
        Ok(File::open("/dev/null")?.into())
    }

    fn protect_socket(&self, fd: RawFd) -> bool {
        self.protected.lock().unwrap().push(fd);
        self.protect_succeeds.load(Ordering::SeqCst)
    }

    fn session_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.markers.lock().unwrap().push("started");
    }

    fn session_finished(&self) {
        let delay = *self.finish_delay.lock().unwrap();
        std::thread::sleep(delay);
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.markers.lock().unwrap().push("finished");
    }
}

pub fn login_form() -> AuthForm {
    AuthForm {
        message: Some("Please enter your username and password.".to_string()),
        error: None,
        fields: vec![
            FormField::new("username", FormFieldKind::Text),
            FormField::new("password", FormFieldKind::Password),
        ],
    }
}

pub fn ip_config() -> IpConfig {
    IpConfig {
        address: Some("10.8.0.12".to_string()),
        netmask: Some("255.255.255.0".to_string()),
        mtu: Some(1406),
        dns: vec!["10.8.0.1".to_string()],
        search_domain: Some("corp.example.com".to_string()),
        ..IpConfig::default()
    }
}

/// A running service plus a facade connected to it
pub struct Harness {
    pub handle: ConnectionHandle,
    pub endpoint: ServiceEndpoint,
    pub record: Arc<EngineRecord>,
    pub host: Arc<MockHost>,
}

pub fn harness(script: EngineScript, prompter: impl CredentialPrompter) -> Harness {
    let factory = MockFactory::new(script);
    let record = factory.record.clone();
    let host = Arc::new(MockHost::default());
    let (endpoint, _service) =
        SessionService::spawn(Arc::new(factory), host.clone(), SessionConfig::default());
    Harness {
        handle: ConnectionHandle::new(endpoint.clone(), prompter),
        endpoint,
        record,
        host,
    }
}

/// Collect messages until the terminal `Disconnected` one
pub async fn collect_until_disconnected(stream: &mut StateStream) -> Vec<StateMessage> {
    let mut messages = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for Disconnected")
            .expect("state bus closed");
        let done = message.state == ConnectionState::Disconnected;
        messages.push(message);
        if done {
            return messages;
        }
    }
}

/// Wait until the stream reports `state`
pub async fn wait_for_state(stream: &mut StateStream, state: ConnectionState) -> Vec<StateMessage> {
    let mut messages = Vec::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", state))
            .expect("state bus closed");
        let done = message.state == state;
        messages.push(message);
        if done {
            return messages;
        }
    }
}

/// State sequence with consecutive duplicates removed
pub fn distinct_states(messages: &[StateMessage]) -> Vec<ConnectionState> {
    let mut states: Vec<ConnectionState> = messages.iter().map(|m| m.state).collect();
    states.dedup();
    states
}
