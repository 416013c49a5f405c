//! The iterative resolver: walks the DNS hierarchy from the root down,
//! following delegations and enforcing a step budget.

use std::net::Ipv4Addr;

use async_recursion::async_recursion;
use dns_types::protocol::types::{DomainName, Message, Question, RecordClass, RecordData, RecordType};
use tracing::{info_span, Instrument};

use crate::cache::SharedCache;
use crate::{bailiwick, querier, ResolutionError, STEP_BUDGET, UPSTREAM_PORT};

/// State carried between iterations of the delegation walk.
struct IterationState {
    server_ip: Ipv4Addr,
    current_domain: DomainName,
    steps_remaining: u32,
}

/// Resolve `question` by iterating the hierarchy from `root_ip`,
/// caching the eventual answer. `request` is the caller's original
/// message, reused verbatim on every upstream hop rather than building
/// a fresh one at each step.
pub async fn resolve(
    root_ip: Ipv4Addr,
    cache: &SharedCache,
    request: &Message,
) -> Result<Message, ResolutionError> {
    let question = request
        .question
        .clone()
        .expect("resolve is only called with a validated single-question request");

    resolve_from(root_ip, cache, request, &question, STEP_BUDGET).await
}

#[async_recursion]
async fn resolve_from(
    root_ip: Ipv4Addr,
    cache: &SharedCache,
    request: &Message,
    question: &Question,
    step_budget: u32,
) -> Result<Message, ResolutionError> {
    let span = info_span!("iterative_resolution", qname = %question.name, qtype = %question.qtype);
    async move {
        let mut state = IterationState {
            server_ip: root_ip,
            current_domain: DomainName::root(),
            steps_remaining: step_budget,
        };
        let mut last_reply: Option<Message> = None;

        loop {
            if state.steps_remaining == 0 {
                return last_reply.ok_or(ResolutionError::StepBudgetExhausted);
            }

            let reply = querier::query(state.server_ip, UPSTREAM_PORT, request)
                .await
                .ok_or(ResolutionError::Timeout)?;
            let filtered = bailiwick::filter(&state.current_domain, &reply);

            if !filtered.answers.is_empty() {
                cache.store(
                    &question.name,
                    question.qtype,
                    filtered.clone(),
                    tokio::time::Instant::now().into_std(),
                );
                return Ok(filtered);
            }

            let ns_records: Vec<_> = filtered
                .authority
                .iter()
                .filter(|rr| rr.rtype() == RecordType::NS)
                .collect();
            if ns_records.is_empty() {
                return Ok(filtered);
            }

            let mut advanced = false;
            for ns in &ns_records {
                let RecordData::NS { nsdname } = &ns.rdata else {
                    continue;
                };
                if let Some(glue_ip) = find_glue(&filtered, nsdname) {
                    state.server_ip = glue_ip;
                    state.current_domain = nsdname.clone();
                    advanced = true;
                    break;
                }
            }

            if !advanced {
                let RecordData::NS { nsdname } = &ns_records[0].rdata else {
                    return Ok(filtered);
                };
                let ns_question = Question {
                    name: nsdname.clone(),
                    qtype: RecordType::A,
                    qclass: RecordClass::IN,
                };
                let mut ns_request = Message::from_question(request.header.id, ns_question.clone());
                ns_request.header.recursion_desired = true;
                match resolve_from(root_ip, cache, &ns_request, &ns_question, STEP_BUDGET).await {
                    Ok(ns_reply) => {
                        if let Some(address) = first_a(&ns_reply.answers) {
                            state.server_ip = address;
                            state.current_domain = nsdname.clone();
                        } else {
                            return Ok(filtered);
                        }
                    }
                    Err(_) => return Ok(filtered),
                }
            }

            last_reply = Some(filtered);
            state.steps_remaining -= 1;
        }
    }
    .instrument(span)
    .await
}

fn find_glue(message: &Message, nsdname: &DomainName) -> Option<Ipv4Addr> {
    message.additional.iter().find_map(|rr| {
        if &rr.name == nsdname {
            if let RecordData::A { address } = &rr.rdata {
                return Some(*address);
            }
        }
        None
    })
}

fn first_a(rrs: &[dns_types::protocol::types::ResourceRecord]) -> Option<Ipv4Addr> {
    rrs.iter().find_map(|rr| {
        if let RecordData::A { address } = &rr.rdata {
            Some(*address)
        } else {
            None
        }
    })
}
