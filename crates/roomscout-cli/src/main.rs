use anyhow::{bail, Context};
use clap::Parser;
use roomscout_core::{
    catalog::FEATURED_COUNT, search::rooms_path, AuthContext, AvatarUploader, Catalog, Config, FilterState,
    Listing, PasswordChange, ProfileService, Role, SelectedFile, SessionStore, SignUpOutcome, SignUpRequest, SupabaseBackend,
    TracingNotifier, UploadOutcome, UploadPolicy,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Listings shipped with the binary, used when nothing else is configured
const BUNDLED_CATALOG: &str = include_str!("../data/rooms.json");

#[derive(Parser)]
#[command(name = "roomscout")]
#[command(version, about = "Find a room to rent and manage your RoomScout profile", long_about = None)]
struct Cli {
    /// Listings JSON file to browse instead of the configured one
    #[arg(long, global = true, env = "ROOMSCOUT_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Search listings
    Search {
        /// Words that must all appear in the listing
        query: Vec<String>,
        /// Lowest monthly price
        #[arg(long)]
        min_price: Option<f64>,
        /// Highest monthly price
        #[arg(long)]
        max_price: Option<f64>,
        /// Neighborhood or city
        #[arg(long)]
        location: Option<String>,
        /// Required amenity, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show listing details
    Show {
        /// Listing id
        id: String,
    },
    /// Listings featured on the home page
    Featured {
        #[arg(long, default_value_t = FEATURED_COUNT)]
        limit: usize,
    },
    /// Sign in
    Login {
        email: String,
        /// Sign in as an advertiser instead of a renter
        #[arg(long)]
        advertiser: bool,
        /// Stay signed in across runs
        #[arg(long)]
        remember: bool,
        /// Read from stdin when not given
        #[arg(long, env = "ROOMSCOUT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in with a Google ID token
    LoginGoogle {
        #[arg(long, env = "ROOMSCOUT_GOOGLE_ID_TOKEN", hide_env_values = true)]
        id_token: String,
        #[arg(long)]
        advertiser: bool,
        #[arg(long)]
        remember: bool,
    },
    /// Create an account
    Register {
        email: String,
        /// Full name shown on your profile
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        advertiser: bool,
        /// Accept the terms of use
        #[arg(long)]
        accept_terms: bool,
        /// Read from stdin when not given
        #[arg(long, env = "ROOMSCOUT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Change your password
    Password {
        /// Read from stdin when not given
        #[arg(long, env = "ROOMSCOUT_PASSWORD", hide_env_values = true)]
        current: Option<String>,
        /// Read from stdin (twice) when not given
        #[arg(long = "new", env = "ROOMSCOUT_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show who is signed in
    Whoami,
    /// Show or edit your profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        /// Empty string clears it
        #[arg(long)]
        phone: Option<String>,
    },
    /// Upload a new profile photo
    Avatar {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomscout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;

    match cli.command {
        Some(Commands::Search {
            query,
            min_price,
            max_price,
            location,
            tags,
        }) => {
            let catalog = load_catalog(cli.catalog.as_deref(), &config)?;

            let mut state = tags
                .into_iter()
                .fold(FilterState::new().search(query.join(" ")), FilterState::tag);
            state.price_min = min_price;
            state.price_max = max_price;
            state.select_location(location.as_deref());

            tracing::info!("Searching with {:?}", state);
            let results = roomscout_core::filter_listings(catalog.listings(), &state);

            println!("{}", roomscout_core::results_label(results.len()));
            for listing in results {
                print_summary(listing);
            }
            if let Some((_, term)) = state.query_param() {
                println!("\nShare: {}", rooms_path(&term));
            }
        }
        Some(Commands::Show { id }) => {
            let catalog = load_catalog(cli.catalog.as_deref(), &config)?;
            print_details(catalog.get(&id)?);
        }
        Some(Commands::Featured { limit }) => {
            let catalog = load_catalog(cli.catalog.as_deref(), &config)?;
            for listing in catalog.featured(limit) {
                print_summary(listing);
            }
        }
        Some(Commands::Login {
            email,
            advertiser,
            remember,
            password,
        }) => {
            let (_, auth) = connect(&config)?;
            let password = password_or_stdin(password, "Password")?;
            let identity = auth.sign_in(&email, &password, role(advertiser), remember).await?;

            println!("Signed in as {} ({})", identity.email, identity.role);
            if !remember {
                println!("Session not saved; pass --remember to stay signed in");
            }
        }
        Some(Commands::LoginGoogle {
            id_token,
            advertiser,
            remember,
        }) => {
            let (_, auth) = connect(&config)?;
            let identity = auth
                .sign_in_with_google(&id_token, role(advertiser), remember)
                .await?;
            println!("Signed in with Google as {} ({})", identity.email, identity.role);
        }
        Some(Commands::Register {
            email,
            name,
            phone,
            advertiser,
            accept_terms,
            password,
        }) => {
            let (_, auth) = connect(&config)?;
            let password = password_or_stdin(password, "Password")?;
            let request = SignUpRequest {
                display_name: name,
                email,
                confirm_password: password.clone(),
                password,
                phone,
                role: role(advertiser),
                accepted_terms: accept_terms,
            };

            match auth.sign_up(&request).await? {
                SignUpOutcome::SignedIn(identity) => println!("Welcome, {}", identity.email),
                SignUpOutcome::ConfirmationRequired => {
                    println!("Account created. Check your email to confirm it, then run `roomscout login`.")
                }
            }
        }
        Some(Commands::Password { current, new_password }) => {
            let (_, auth) = connect(&config)?;
            signed_in(&auth).await?;

            let current_password = password_or_stdin(current, "Current password")?;
            let change = match new_password {
                Some(new_password) => PasswordChange {
                    current_password,
                    confirm_password: new_password.clone(),
                    new_password,
                },
                None => PasswordChange {
                    current_password,
                    new_password: password_or_stdin(None, "New password")?,
                    confirm_password: password_or_stdin(None, "Repeat new password")?,
                },
            };

            auth.change_password(&change).await?;
            println!("Password updated");
        }
        Some(Commands::Logout) => {
            let (_, auth) = connect(&config)?;
            auth.restore().await?;
            auth.sign_out().await?;
            println!("Signed out");
        }
        Some(Commands::Whoami) => {
            let (backend, auth) = connect(&config)?;
            match auth.restore().await? {
                Some(identity) => {
                    let profile = ProfileService::new(backend, Arc::new(TracingNotifier), identity);
                    let record = profile.refresh().await?;
                    println!("{} <{}> ({})", record.display_name, record.email, profile.owner().role);
                }
                None => println!("Not signed in"),
            }
        }
        Some(Commands::Profile { name, phone }) => {
            let (backend, auth) = connect(&config)?;
            let identity = signed_in(&auth).await?;
            let profile = ProfileService::new(backend, Arc::new(TracingNotifier), identity);
            let record = profile.refresh().await?;

            if name.is_some() || phone.is_some() {
                let new_name = name.unwrap_or_else(|| record.display_name.clone());
                let new_phone = phone.or_else(|| record.phone.clone());
                profile.save_details(&new_name, new_phone.as_deref()).await?;
            }

            if let Some(record) = profile.profile() {
                println!("Name:   {}", record.display_name);
                println!("Email:  {}", record.email);
                println!("Phone:  {}", record.phone.as_deref().unwrap_or("-"));
                println!("Avatar: {}", record.avatar_url.as_deref().unwrap_or("-"));
            }
        }
        Some(Commands::Avatar { file }) => {
            let (backend, auth) = connect(&config)?;
            let identity = signed_in(&auth).await?;
            let notifier = Arc::new(TracingNotifier);

            let profile = ProfileService::new(backend.clone(), notifier.clone(), identity.clone());
            let current = profile.refresh().await?.avatar_url;

            let uploader = AvatarUploader::new(
                backend.clone(),
                backend,
                notifier,
                UploadPolicy::from(&config.upload),
            );
            let selection = read_selection(&file)?;

            let outcome = uploader
                .handle_selection(Some(selection), Some(&identity), current.as_deref(), |url| {
                    profile.apply_avatar(url)
                })
                .await;

            match outcome {
                UploadOutcome::Succeeded { url } => println!("Profile photo updated: {}", url),
                UploadOutcome::Rejected(e) => bail!(e),
                UploadOutcome::Failed { reason } => bail!("Upload failed: {}", reason),
                UploadOutcome::Busy | UploadOutcome::Skipped => {}
            }
        }
        None => {
            println!("No command specified. Try --help");
        }
    }

    Ok(())
}

fn role(advertiser: bool) -> Role {
    if advertiser {
        Role::Advertiser
    } else {
        Role::Renter
    }
}

/// Catalog from --catalog, then the config file, then the bundled sample
fn load_catalog(flag: Option<&Path>, config: &Config) -> anyhow::Result<Catalog> {
    match flag.or(config.catalog.path.as_deref()) {
        Some(path) => Catalog::load(path).with_context(|| format!("Failed to load listings from {}", path.display())),
        None => Ok(Catalog::from_json(BUNDLED_CATALOG)?),
    }
}

fn connect(config: &Config) -> anyhow::Result<(Arc<SupabaseBackend>, AuthContext)> {
    let backend = Arc::new(SupabaseBackend::from_config(&config.backend)?);
    let auth = AuthContext::new(backend.clone(), backend.clone()).with_store(SessionStore::at_default_location()?);
    Ok((backend, auth))
}

async fn signed_in(auth: &AuthContext) -> anyhow::Result<roomscout_core::Identity> {
    match auth.restore().await? {
        Some(identity) => Ok(identity),
        None => bail!("Not signed in. Run `roomscout login --remember <email>` first"),
    }
}

fn password_or_stdin(password: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("{}: ", prompt);
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_selection(path: &Path) -> anyhow::Result<SelectedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(SelectedFile::new(name, mime_type.essence_str(), bytes))
}

fn print_summary(listing: &Listing) {
    let badge = match (listing.is_new, listing.is_highlighted) {
        (true, _) => " [new]",
        (false, true) => " [featured]",
        _ => "",
    };
    println!(
        "{:>4}  {}{}\n      {} | {} | {}",
        listing.id,
        listing.title,
        badge,
        listing.location,
        listing.price_label(),
        listing.tags.join(", ")
    );
}

fn print_details(listing: &Listing) {
    println!("{}", listing.title);
    println!("{}  {}", listing.location, listing.price_label());
    if let Some(bills) = &listing.bills {
        println!("Bills: {}", bills);
    }
    if let (Some(rating), Some(reviews)) = (listing.rating, listing.review_count) {
        println!("Rated {:.1} ({} reviews)", rating, reviews);
    }
    println!();
    println!("{}", listing.description);
    if let Some(info) = &listing.additional_info {
        println!("{}", info);
    }

    if !listing.features.is_empty() {
        println!("\nFeatures:");
        for feature in &listing.features {
            println!("  - {}", feature.label);
        }
    }
    if !listing.rules.is_empty() {
        println!("\nHouse rules:");
        for rule in &listing.rules {
            println!("  - {}", rule);
        }
    }

    println!("\nLocation: {}", listing.location_details);
    if let Some(from) = &listing.available_from {
        println!("Available from {}", from);
    }
    if let Some(stay) = &listing.minimum_stay {
        println!("Minimum stay: {}", stay);
    }
    println!("Host: {}", listing.host.name);
}
