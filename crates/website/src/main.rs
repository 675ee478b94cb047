use std::path::PathBuf;
use std::sync::Mutex;

use actix_files as fs;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{error, get, post, web, App, HttpResponse, HttpServer, Responder};
use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use streetmap::config::ServiceArgs;
use streetmap::download::Downloader;
use streetmap::geocode::NominatimClient;
use streetmap::notice::Notice;
use streetmap::session::{Event, GenerateRequest, SessionController, UiState, DEFAULT_FILENAME};

type Session = SessionController<NominatimClient, Downloader>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Street map art server")]
struct Args {
    #[command(flatten)]
    services: ServiceArgs,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    address: String,

    /// Directory holding index.html and the page assets
    #[arg(long, default_value = "crates/website/static")]
    static_dir: PathBuf,
}

struct AppState {
    session: Mutex<Session>,
    static_dir: PathBuf,
}

/// State and notices after an interaction
#[derive(Serialize)]
struct Reply {
    state: UiState,
    notices: Vec<Notice>,
    has_figure: bool,
}

#[derive(Deserialize)]
struct FigureQuery {
    filename: Option<String>,
}

fn with_session<T>(app: &AppState, f: impl FnOnce(&mut Session) -> T) -> anyhow::Result<T> {
    let mut session = app.session.lock().map_err(|_| anyhow!("session state is poisoned"))?;
    Ok(f(&mut session))
}

fn reply(session: &Session, notices: Vec<Notice>) -> Reply {
    Reply {
        state: session.state().clone(),
        notices,
        has_figure: session.figure().is_some(),
    }
}

async fn index(app: web::Data<AppState>) -> actix_web::Result<fs::NamedFile> {
    Ok(fs::NamedFile::open(app.static_dir.join("index.html"))?)
}

#[get("/api/state")]
async fn get_state(app: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let reply = with_session(&app, |session| reply(session, Vec::new()))
        .map_err(error::ErrorInternalServerError)?;
    Ok(web::Json(reply))
}

#[post("/api/event")]
async fn post_event(app: web::Data<AppState>, event: web::Json<Event>) -> actix_web::Result<impl Responder> {
    let event = event.into_inner();
    // Entering a place geocodes, which blocks
    let reply = web::block(move || with_session(&app, |session| {
        let notices = session.dispatch(event);
        reply(session, notices)
    }))
    .await?
    .map_err(error::ErrorInternalServerError)?;
    Ok(web::Json(reply))
}

#[post("/api/generate")]
async fn post_generate(app: web::Data<AppState>, request: web::Json<GenerateRequest>) -> actix_web::Result<impl Responder> {
    let request = request.into_inner();
    let reply = web::block(move || with_session(&app, |session| {
        let notices = session.generate(&request);
        reply(session, notices)
    }))
    .await?
    .map_err(error::ErrorInternalServerError)?;
    Ok(web::Json(reply))
}

#[get("/api/figure.png")]
async fn get_figure(app: web::Data<AppState>, query: web::Query<FigureQuery>) -> actix_web::Result<HttpResponse> {
    let filename = query.into_inner().filename.unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    let download = web::block(move || with_session(&app, |session| session.download(&filename)))
        .await?
        .map_err(error::ErrorInternalServerError)?;

    match download {
        None => Ok(HttpResponse::NotFound().body("No map has been generated yet")),
        Some(Err(e)) => Err(error::ErrorInternalServerError(e)),
        Some(Ok((name, bytes))) => Ok(HttpResponse::Ok()
            .content_type("image/png")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(name)],
            })
            .body(bytes)),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.services.to_config();

    // The HTTP clients are blocking, so build them outside the async runtime
    let font = mapviz::load_font(args.services.font.as_deref())
        .context("Failed to load font")?;
    let geocoder = NominatimClient::new(&config)
        .context("Failed to create geocoder")?;
    let downloader = Downloader::new(&config)
        .context("Failed to create downloader")?;
    let session = SessionController::new(geocoder, downloader).with_font(font);

    let app = web::Data::new(AppState {
        session: Mutex::new(session),
        static_dir: args.static_dir.clone(),
    });

    info!("Starting server at http://{}", args.address);
    println!("Starting server at http://{}", args.address);

    let static_dir = args.static_dir;
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(app.clone())
                .route("/", web::get().to(index))
                .service(get_state)
                .service(post_event)
                .service(post_generate)
                .service(get_figure)
                .service(fs::Files::new("/static", static_dir.clone())
                    .use_last_modified(true))
        })
        .bind(&args.address)?
        .run()
        .await
    })
    .context("Server failed")?;

    Ok(())
}
