use crate::context::Context;
use crate::handler::Handler;
use http::StatusCode;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Catches panics raised by the rest of the chain and answers 500.
///
/// When the response was already committed the client only sees a truncated
/// body; the panic is logged and recorded on the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

pub fn recovery() -> Recovery {
    Recovery
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}

impl Handler for Recovery {
    fn handle(&self, ctx: &mut Context) {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
            return;
        };

        let message = panic_message(payload.as_ref()).to_string();
        error!(method = %ctx.method(), path = ctx.path(), panic = %message, "panic recovered");

        if ctx.response().written() {
            ctx.error(format!("panic recovered: {message}"));
            ctx.abort();
        } else {
            ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    fn name(&self) -> &'static str {
        "micro_engine::middleware::recovery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::get;
    use crate::engine::Engine;
    use crate::router::Routes;

    fn boom(_: &mut Context) {
        panic!("boom");
    }

    fn partial(ctx: &mut Context) {
        ctx.string(StatusCode::OK, "partial");
        panic!("half way");
    }

    fn owned_panic(_: &mut Context) {
        panic::panic_any(String::from("owned message"));
    }

    #[test]
    fn test_panic_becomes_500() {
        let mut engine = Engine::new();
        engine.use_middleware(recovery());
        engine.get("/panic", boom);

        let recorder = engine.handle_recorded(get("/panic"));
        assert_eq!(recorder.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(recorder.body_string(), "");
    }

    #[test]
    fn test_panic_after_commit_keeps_partial_response() {
        let mut engine = Engine::new();
        engine.use_middleware((
            |ctx: &mut Context| {
                ctx.next();
                let errors = ctx.errors().to_string();
                let _ = ctx.writer().write_string(&format!("|{}", errors.contains("half way")));
            },
            recovery(),
        ));
        engine.get("/partial", partial);

        let recorder = engine.handle_recorded(get("/partial"));
        assert_eq!(recorder.status(), StatusCode::OK);
        assert_eq!(recorder.body_string(), "partial|true");
    }

    #[test]
    fn test_handlers_after_panic_do_not_run() {
        let mut engine = Engine::new();
        engine.use_middleware(recovery());
        engine.get(
            "/",
            (
                owned_panic,
                |ctx: &mut Context| ctx.string(StatusCode::OK, "unreachable"),
            ),
        );

        let recorder = engine.handle_recorded(get("/"));
        assert_eq!(recorder.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!recorder.body_string().contains("unreachable"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "Box<dyn Any>");
    }
}
