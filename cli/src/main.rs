use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use lms_session::callback::{self, CallbackError};
use lms_session::config::{ConfigError, DEFAULT_SITE_URL, HttpTimeouts};
use lms_session::{
    AuthBackend, AuthState, BackendConfig, ChannelNotifier, ClientError, ErrorCode, OAuthProvider, Phase,
    ProfileError, ProfileForm, SessionStore, SignUpOutcome, SupabaseBackend,
};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error("not signed in; run `lms login` first")]
    NotSignedIn,
    #[error("timed out waiting for session state")]
    Timeout,
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Client(e) => e.error_code(),
            Self::Profile(e) => e.error_code(),
            Self::Callback(e) => e.error_code(),
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
            Self::Timeout => "E_TIMEOUT",
            Self::Signal(_) => "E_SIGNAL",
            Self::InvalidJson(_) => "E_JSON",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lms", about = "LMS session and profile CLI")]
struct Cli {
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    #[arg(long, env = "LMS_SITE_URL", default_value = DEFAULT_SITE_URL)]
    site_url: String,

    #[arg(long, env = "LMS_SESSION_FILE", default_value = ".lms-session.json")]
    session_file: PathBuf,

    #[arg(long, env = "LMS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "LMS_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Seconds to wait for the session state to settle.
    #[arg(long, default_value_t = 15)]
    wait_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LMS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the provider authorization URL to open in a browser.
    Oauth {
        #[arg(long, default_value = "google")]
        provider: OAuthProvider,
    },
    /// Complete an OAuth login from the full callback URL the browser landed on.
    Callback {
        #[arg(long)]
        url: String,
    },
    /// Create an account.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LMS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    Logout,
    /// Show the current session and profile.
    Whoami,
    Profile(ProfileCommand),
    /// Print every state change until interrupted.
    Watch,
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    /// Edit fields; omitted fields keep their current value.
    Update(ProfileUpdateArgs),
}

#[derive(Args, Debug)]
struct ProfileUpdateArgs {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    #[arg(long)]
    twitter: Option<String>,
    #[arg(long)]
    github: Option<String>,
}

struct CliContext {
    backend: Arc<dyn AuthBackend>,
    redirect_url: String,
    site_url: String,
    wait: Duration,
}

impl CliContext {
    fn store(&self) -> SessionStore {
        let (notifier, mut rx) = ChannelNotifier::new();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                eprintln!("{notification}");
            }
        });
        SessionStore::start(Arc::clone(&self.backend), Arc::new(notifier), self.redirect_url.clone())
    }

    async fn settle(&self, store: &SessionStore) -> Result<AuthState, CliError> {
        tokio::time::timeout(self.wait, store.loaded())
            .await
            .map_err(|_| CliError::Timeout)
    }

    async fn wait_for(&self, store: &SessionStore, pred: impl Fn(&AuthState) -> bool) -> Result<AuthState, CliError> {
        let mut rx = store.subscribe();
        let waited = tokio::time::timeout(self.wait, rx.wait_for(|state| pred(state))).await;
        match waited {
            Ok(Ok(state)) => Ok(AuthState::clone(&state)),
            Ok(Err(_)) => Ok(store.state()),
            Err(_) => Err(CliError::Timeout),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error [{}]: {e}", e.code());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = BackendConfig::new(&cli.supabase_url, cli.anon_key)?.with_site_url(&cli.site_url)?;
    config.session_file = Some(cli.session_file);
    config.timeouts = HttpTimeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs };

    let ctx = CliContext {
        backend: Arc::new(SupabaseBackend::new(&config)?),
        redirect_url: config.redirect_url(),
        site_url: config.site_url.clone(),
        wait: Duration::from_secs(cli.wait_secs),
    };

    match cli.command {
        Command::Login { email, password } => run_login(&ctx, &email, &password).await,
        Command::Oauth { provider } => run_oauth(&ctx, provider).await,
        Command::Callback { url } => run_callback(&ctx, &url).await,
        Command::Signup { email, password, name } => run_signup(&ctx, &email, &password, name.as_deref()).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Whoami => run_whoami(&ctx).await,
        Command::Profile(profile) => match profile.command {
            ProfileSubcommand::Show => run_profile_show(&ctx).await,
            ProfileSubcommand::Update(args) => run_profile_update(&ctx, args).await,
        },
        Command::Watch => run_watch(&ctx).await,
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

async fn run_login(ctx: &CliContext, email: &str, password: &str) -> Result<(), CliError> {
    let store = ctx.store();
    ctx.settle(&store).await?;
    store.login_with_password(email, password).await?;
    let state = ctx
        .wait_for(&store, |s| s.phase() == Phase::Authenticated)
        .await?;
    print_json(&state_json(&state))
}

async fn run_oauth(ctx: &CliContext, provider: OAuthProvider) -> Result<(), CliError> {
    let store = ctx.store();
    let url = store.login_with_oauth(provider).await?;
    println!("{url}");
    eprintln!("open the URL above, then run `lms callback --url <redirected URL>`");
    Ok(())
}

async fn run_callback(ctx: &CliContext, url: &str) -> Result<(), CliError> {
    let (origin, query) = callback::parse_callback_url(url)?;
    if origin != ctx.site_url {
        tracing::warn!(%origin, site_url = %ctx.site_url, "callback origin differs from configured site URL");
    }
    let redirect = callback::handle_callback(ctx.backend.as_ref(), &origin, &query).await;
    print_json(&json!({ "signed_in": redirect.signed_in, "location": redirect.location }))
}

async fn run_signup(ctx: &CliContext, email: &str, password: &str, name: Option<&str>) -> Result<(), CliError> {
    let store = ctx.store();
    ctx.settle(&store).await?;
    let outcome = store.sign_up(email, password, name).await?;
    let outcome = match outcome {
        SignUpOutcome::ConfirmationPending => "confirmation_pending",
        SignUpOutcome::SignedIn => "signed_in",
    };
    print_json(&json!({ "outcome": outcome }))
}

async fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.store();
    let state = ctx.settle(&store).await?;
    if !state.is_signed_in() {
        return Err(CliError::NotSignedIn);
    }
    store.logout().await?;
    let state = ctx.wait_for(&store, |s| s.session.is_none()).await?;
    print_json(&state_json(&state))
}

async fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.store();
    let state = ctx.settle(&store).await?;
    print_json(&state_json(&state))
}

async fn run_profile_show(ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.store();
    let state = ctx.settle(&store).await?;
    if !state.is_signed_in() {
        return Err(CliError::NotSignedIn);
    }
    print_json(&serde_json::to_value(&state.profile)?)
}

async fn run_profile_update(ctx: &CliContext, args: ProfileUpdateArgs) -> Result<(), CliError> {
    let store = ctx.store();
    let state = ctx.settle(&store).await?;
    if !state.is_signed_in() {
        return Err(CliError::NotSignedIn);
    }
    let mut form = state.profile.as_ref().map(ProfileForm::from_profile).unwrap_or_default();
    let overrides = [
        (&mut form.full_name, args.full_name),
        (&mut form.phone_number, args.phone),
        (&mut form.bio, args.bio),
        (&mut form.linkedin, args.linkedin),
        (&mut form.twitter, args.twitter),
        (&mut form.github, args.github),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }
    let profile = store.update_profile(form).await?;
    print_json(&serde_json::to_value(&profile)?)
}

async fn run_watch(ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.store();
    let mut rx = store.subscribe();
    print_json(&state_json(&rx.borrow_and_update()))?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = AuthState::clone(&rx.borrow_and_update());
                print_json(&state_json(&state))?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                store.shutdown();
                return Ok(());
            }
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn state_json(state: &AuthState) -> Value {
    let phase = match state.phase() {
        Phase::Initializing => "initializing",
        Phase::ResolvingProfile => "resolving_profile",
        Phase::Authenticated => "authenticated",
        Phase::Anonymous => "anonymous",
    };
    json!({
        "phase": phase,
        "user_id": state.user_id(),
        "email": state.session.as_ref().and_then(|s| s.user.email.clone()),
        "profile": state.profile,
        "mobile_sidebar_open": state.mobile_sidebar_open,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
