use crate::{
    normalize_url_bytes, DomainPolicy, Effect, FetchOutcome, Method, Msg, Reason,
    ResolutionState, Stage,
};

/// Pure update function: applies a message to the resolution and returns the
/// effect its driver should run next. Messages arriving out of order are ignored.
pub fn update(
    policy: &DomainPolicy,
    mut state: ResolutionState,
    msg: Msg,
) -> (ResolutionState, Vec<Effect>) {
    let effects = match msg {
        Msg::Submitted(raw) if state.stage == Stage::Init => {
            state.original = String::from_utf8_lossy(&raw).into_owned();
            let Some(url) = normalize_url_bytes(&raw) else {
                return finish(state, Reason::InvalidUrl);
            };
            state.stage = Stage::Validated;
            let admitted = policy.admits(&url);
            state.current = Some(url.clone());
            if !admitted {
                return finish(state, Reason::NotInLists);
            }
            state.stage = Stage::Filtered;
            vec![Effect::Fetch { url }]
        }
        Msg::Fetched(outcome) if state.stage == Stage::Filtered => {
            let FetchOutcome {
                body,
                declared_charset,
                final_url,
                failure,
                ..
            } = outcome;
            state.stage = Stage::Fetched;
            state.fetch_failure = failure;

            if let Some(final_url) = final_url {
                if state.current.as_ref() != Some(&final_url) {
                    state.method = Method::Redirect;
                    state.current = Some(final_url);
                }
            }

            let trusted = state
                .current
                .as_ref()
                .is_some_and(|url| policy.trusts(url));
            if !trusted {
                return finish(state, Reason::NotInWhitelist);
            }

            match body.filter(|body| !body.is_empty()) {
                Some(body) => vec![Effect::Decode {
                    body,
                    declared_charset,
                }],
                None => return finish(state, Reason::NoContent),
            }
        }
        Msg::Decoded(text) if state.stage == Stage::Fetched => match text {
            Some(text) => {
                state.stage = Stage::Decoded;
                vec![Effect::Extract { text }]
            }
            None => return finish(state, Reason::DecodeFailed),
        },
        Msg::Extracted(found) if state.stage == Stage::Decoded => {
            state.stage = Stage::Extracted;
            match found {
                Some(canonical) => {
                    state.method = Method::Canonical;
                    state.current = Some(canonical);
                    return finish(state, Reason::Canonical);
                }
                None => return finish(state, Reason::NoAttributes),
            }
        }
        _ => Vec::new(),
    };

    (state, effects)
}

fn finish(mut state: ResolutionState, reason: Reason) -> (ResolutionState, Vec<Effect>) {
    let resolution = state.finish(reason);
    (state, vec![Effect::Complete(resolution)])
}
