use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use log::{error, info};
use once_cell::sync::Lazy;

use lib_wordle::feedback::{code_to_trits, oracle_code};
use lib_wordle::persistence;
use lib_wordle::tree::Tree;
use lib_wordle::word::Word;
use lib_wordle::wv_safe;

static ANSWERS: &str = std::include_str!("../../data/solutions.txt");
static GUESSES: &str = std::include_str!("../../data/guesses.txt");
static TREE_JSON: &str = std::include_str!("../../data/tree.json");
static INDEX: &str = std::include_str!("../index.html");

struct AppState {
    targets: Vec<Word>,
    guesses: Vec<Word>,
    tree: Tree,
}

impl AppState {
    fn new() -> AppState {
        let targets = Word::parse_lines(ANSWERS);
        let guesses = Word::parse_lines(GUESSES);
        let tree = persistence::from_json(TREE_JSON, &guesses).expect("embedded tree.json must be a valid persisted tree");
        AppState { targets, guesses, tree }
    }
}

static APP_STATE: Lazy<AppState> = Lazy::new(AppState::new);

/// Replays a completed guess sequence (the last word is the known answer)
/// against the embedded tree, reporting at each turn what the tree would
/// have recommended versus what was actually played.
fn assess_inner(guesses_param: &str) -> Result<String, String> {
    let played = wv_safe(guesses_param)?;
    let answer = *played.last().ok_or("must provide one or more guesses")?;

    let state = &*APP_STATE;
    if !state.targets.contains(&answer) {
        return Err(format!("'{}' is not a Wordle answer", answer.to_string()));
    }

    let mut output = String::new();
    let mut vertex_id = state.tree.root;

    for (turn, &guess) in played.iter().enumerate() {
        let vertex = &state.tree.vertices[vertex_id];
        let recommended = state.guesses[vertex.guess_index];
        let code = oracle_code(answer, guess);

        output += &format!(
            "{}) played '{}' (tree recommends '{}') -> feedback {:?}\n",
            turn + 1,
            guess.to_string(),
            recommended.to_string(),
            code_to_trits(code)
        );

        if guess == answer {
            break;
        }

        match vertex.children.get(&code) {
            Some(&child) => vertex_id = child,
            None => {
                output += "(tree has no further guidance for this feedback sequence)\n";
                break;
            }
        }
    }

    Ok(output)
}

async fn assess(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if let Some(query) = req.uri().query() {
        let params = form_urlencoded::parse(query.as_bytes()).into_owned().collect::<HashMap<String, String>>();
        let guesses = params.get("g").map(|g| g.as_str()).unwrap_or("");

        return Ok(match assess_inner(guesses) {
            Ok(result) => Response::builder().header("Content-Type", "text/plain; charset=utf-8").body(result.into()).unwrap(),
            Err(err) => {
                error!("assess request failed: {err}");
                Response::builder().status(400).body(err.into()).unwrap()
            }
        });
    }

    Ok(Response::builder().status(400).body("Must pass 'g' with Wordle guesses".into()).unwrap())
}

async fn index(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::builder().header("Content-Type", "text/html; charset=utf-8").body(INDEX.into()).unwrap())
}

async fn route(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    match req.uri().path() {
        "/" => index(req).await,
        "/assess" => assess(req).await,
        _ => Ok(Response::builder().status(404).body("Not Found".into()).unwrap()),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    info!("starting on {addr:?}, {} vertices loaded", APP_STATE.tree.vertex_count());

    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(route)) });
    let server = Server::bind(&addr).serve(make_svc);

    if let Err(err) = server.await {
        error!("server error: {err}");
    }
}
