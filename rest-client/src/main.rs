use std::path::PathBuf;

use clap::{
    builder::{styling::AnsiColor, Styles},
    Parser, Subcommand,
};
use color_eyre::eyre::{bail, Result, WrapErr as _};
use orb_rest_client::reqwest::header::HeaderValue;
use orb_rest_client::{
    AsyncRestClient, ClientConfig, HttpProxyConfig, ResponseEntity, TlsContext,
};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

/// Issue a single request with orb-rest-client and print the response.
#[derive(Parser, Debug)]
#[clap(version, about, styles = clap_v3_styles())]
struct Cli {
    /// Base URL every request path is appended to.
    #[arg(long, env = "ORB_REST_CLIENT_BASE_URL")]
    base_url: String,
    /// Host of an HTTP forward proxy. Ignored unless --proxy-port is set too.
    #[arg(long, env = "ORB_REST_CLIENT_PROXY_HOST", default_value = "")]
    proxy_host: String,
    /// Port of an HTTP forward proxy. 0 disables the proxy.
    #[arg(long, env = "ORB_REST_CLIENT_PROXY_PORT", default_value_t = 0)]
    proxy_port: u16,
    /// PEM bundle of CA certificates to trust instead of the built-in roots.
    #[arg(long, env = "ORB_REST_CLIENT_CA_CERT")]
    ca_cert: Option<PathBuf>,
    /// PEM file holding a client certificate chain and its private key.
    #[arg(long, env = "ORB_REST_CLIENT_IDENTITY", requires = "ca_cert")]
    client_identity: Option<PathBuf>,
    /// Refuse response bodies larger than this many bytes.
    #[arg(long)]
    max_in_memory_size: Option<usize>,
    /// Print status and headers before the body. Not available for POSTs
    /// with basic auth, which only yield the body.
    #[arg(long)]
    entity: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a resource.
    Get { path: String },
    /// DELETE a resource.
    Delete { path: String },
    /// POST a body, optionally with basic auth.
    Post {
        path: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
    /// PUT a JSON body.
    Put { path: String, body: String },
}

fn clap_v3_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Green.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;
    let cli = Cli::parse();
    debug!(?cli, "parsed arguments");
    check_entity_supported(&cli)?;

    let client = AsyncRestClient::new(client_config(&cli).await?);
    run(&client, cli.command, cli.entity).await
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .wrap_err("failed to install tracing subscriber")
}

fn check_entity_supported(cli: &Cli) -> Result<()> {
    if cli.entity && matches!(cli.command, Command::Post { username: Some(_), .. }) {
        bail!("--entity cannot be combined with --username/--password");
    }
    Ok(())
}

async fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::new(&cli.base_url)
        .with_proxy(HttpProxyConfig::new(&cli.proxy_host, cli.proxy_port))
        .with_max_in_memory_size(cli.max_in_memory_size);

    if let Some(ca_cert) = &cli.ca_cert {
        let pem = tokio::fs::read(ca_cert)
            .await
            .wrap_err_with(|| format!("failed to read {}", ca_cert.display()))?;
        let mut tls = TlsContext::from_pem(&pem)?;
        if let Some(identity) = &cli.client_identity {
            let pem = tokio::fs::read(identity)
                .await
                .wrap_err_with(|| format!("failed to read {}", identity.display()))?;
            tls = tls.with_identity_pem(&pem)?;
        }
        config = config.with_tls(tls);
    }

    Ok(config)
}

async fn run(client: &AsyncRestClient, command: Command, entity: bool) -> Result<()> {
    let response = match command {
        Command::Get { path } => client.get_for_entity(&path).await?,
        Command::Delete { path } => client.delete_for_entity(&path).await?,
        Command::Put { path, body } => client.put_for_entity(&path, &body).await?,
        Command::Post {
            path,
            body,
            content_type,
            username,
            password,
        } => {
            let content_type = content_type
                .map(HeaderValue::try_from)
                .transpose()
                .wrap_err("invalid content type")?;
            if let (Some(username), Some(password)) = (username, password) {
                let body = client
                    .post_with_auth_header(
                        &path,
                        body.as_deref().unwrap_or_default(),
                        &username,
                        &password,
                        content_type,
                    )
                    .await?;
                println!("{body}");
                return Ok(());
            }
            client
                .post_for_entity(&path, body.as_deref(), content_type)
                .await?
        }
    };

    print_response(&response, entity);
    Ok(())
}

fn print_response(response: &ResponseEntity, entity: bool) {
    if entity {
        println!("{}", response.status());
        for (name, value) in response.headers() {
            println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }
    println!("{}", response.body().unwrap_or_default());
}
