//! Order server: TCP termination for order entry
//!
//! One non-blocking thread services every client session. Inbound frames
//! are validated (sequence strictly increasing from 1, stable client id
//! per connection) and forwarded to the matching engine's requests ring;
//! responses are drained from the engine and routed back to the owning
//! session with a per-client outbound sequence starting at 1. Protocol
//! violations are logged and skipped, never fatal.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use runtime::{Consumer, Producer, RunFlag};
use tracing::{debug, error, info, warn};
use types::prelude::*;
use types::wire;

struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    rx_buf: Vec<u8>,
    /// Bound by the first valid frame on the connection.
    client_id: Option<ClientId>,
    next_inbound_seq: u64,
    next_outbound_seq: u64,
}

impl Session {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            rx_buf: Vec::with_capacity(4096),
            client_id: None,
            next_inbound_seq: 1,
            next_outbound_seq: 1,
        }
    }
}

pub struct OrderServer {
    listener: TcpListener,
    sessions: Vec<Option<Session>>,
    client_sessions: Vec<Option<usize>>,
    requests: Producer<ClientRequest>,
    responses: Consumer<ClientResponse>,
    run: RunFlag,
}

impl OrderServer {
    pub fn new(
        cfg: &ExchangeConfig,
        requests: Producer<ClientRequest>,
        responses: Consumer<ClientResponse>,
        run: RunFlag,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", cfg.order_server_port))?;
        listener.set_nonblocking(true)?;
        info!(target: "order_server", addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            sessions: Vec::new(),
            client_sessions: vec![None; MAX_CLIENTS],
            requests,
            responses,
            run,
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// One service pass: accept, read every session, route responses.
    pub fn poll(&mut self) -> bool {
        let mut worked = self.accept_connections();
        worked |= self.service_sessions();
        worked |= self.route_responses();
        worked
    }

    pub fn run(&mut self) {
        debug!(target: "order_server", "order server running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        debug!(target: "order_server", "order server stopped");
    }

    fn accept_connections(&mut self) -> bool {
        let mut accepted = false;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        error!(target: "order_server", %peer, %err, "failed to configure session");
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    info!(target: "order_server", %peer, "session connected");
                    let session = Session::new(stream, peer);
                    if let Some(slot) = self.sessions.iter_mut().find(|s| s.is_none()) {
                        *slot = Some(session);
                    } else {
                        self.sessions.push(Some(session));
                    }
                    accepted = true;
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    error!(target: "order_server", %err, "accept failed");
                    break;
                }
            }
        }
        accepted
    }

    fn service_sessions(&mut self) -> bool {
        let mut worked = false;
        for index in 0..self.sessions.len() {
            let Some(session) = self.sessions[index].as_mut() else {
                continue;
            };

            let mut disconnect = false;
            let mut chunk = [0u8; 4096];
            loop {
                match session.stream.read(&mut chunk) {
                    Ok(0) => {
                        disconnect = true;
                        break;
                    }
                    Ok(len) => {
                        session.rx_buf.extend_from_slice(&chunk[..len]);
                        worked = true;
                    }
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(target: "order_server", peer = %session.peer, %err, "read failed");
                        disconnect = true;
                        break;
                    }
                }
            }

            if !disconnect {
                self.parse_session_frames(index);
            }
            if disconnect {
                self.drop_session(index, "peer closed");
            }
        }
        worked
    }

    fn parse_session_frames(&mut self, index: usize) {
        let mut consumed = 0;
        loop {
            let session = self.sessions[index].as_mut().unwrap();
            let remaining = &session.rx_buf[consumed..];
            if remaining.len() < wire::REQUEST_FRAME_LEN {
                break;
            }
            match wire::decode_request(remaining) {
                Ok(frame) => {
                    consumed += wire::REQUEST_FRAME_LEN;
                    self.handle_frame(index, frame);
                }
                Err(err) => {
                    // An undecodable record desynchronizes the byte
                    // stream; nothing after it can be trusted.
                    warn!(target: "order_server", %err, "undecodable frame, dropping session");
                    self.drop_session(index, "bad frame");
                    return;
                }
            }
        }
        let session = self.sessions[index].as_mut().unwrap();
        session.rx_buf.drain(..consumed);
    }

    fn handle_frame(&mut self, index: usize, frame: SequencedRequest) {
        let request = frame.request;
        debug!(target: "order_server", seq = frame.seq, %request, "received");

        if request.client_id as usize >= MAX_CLIENTS {
            error!(target: "order_server", %request, "client id out of range, skipping");
            return;
        }

        let session = self.sessions[index].as_mut().unwrap();
        match session.client_id {
            None => {
                let client = request.client_id as usize;
                if let Some(other) = self.client_sessions[client] {
                    error!(
                        target: "order_server",
                        client_id = request.client_id,
                        other_session = other,
                        "client already bound to another session, skipping"
                    );
                    return;
                }
                session.client_id = Some(request.client_id);
                self.client_sessions[client] = Some(index);
            }
            Some(bound) if bound != request.client_id => {
                let violation = SessionError::ClientIdMismatch {
                    expected: bound as u64,
                    received: request.client_id as u64,
                };
                error!(target: "order_server", %violation, "skipping frame");
                return;
            }
            Some(_) => {}
        }

        let session = self.sessions[index].as_mut().unwrap();
        if frame.seq != session.next_inbound_seq {
            let violation = SessionError::OutOfSequence {
                expected: session.next_inbound_seq,
                received: frame.seq,
            };
            error!(target: "order_server", %violation, "skipping frame");
            return;
        }
        session.next_inbound_seq += 1;

        if let Err(dropped) = self.requests.push(request) {
            error!(target: "order_server", request = %dropped, "request ring full, dropping");
        }
    }

    fn route_responses(&mut self) -> bool {
        let mut worked = false;
        while let Some(response) = self.responses.pop() {
            worked = true;
            let client = response.client_id as usize;
            let Some(index) = (client < MAX_CLIENTS)
                .then(|| self.client_sessions[client])
                .flatten()
            else {
                error!(target: "order_server", %response, "no session for client, dropping");
                continue;
            };

            let write_result = {
                let session = self.sessions[index].as_mut().unwrap();
                let frame = SequencedResponse {
                    seq: session.next_outbound_seq,
                    response,
                };
                session.next_outbound_seq += 1;
                debug!(target: "order_server", seq = frame.seq, %response, "sending");

                let bytes = wire::encode_response(&frame);
                write_fully(&mut session.stream, &bytes)
            };
            if let Err(err) = write_result {
                warn!(target: "order_server", %err, "write failed");
                self.drop_session(index, "write failure");
            }
        }
        worked
    }

    fn drop_session(&mut self, index: usize, reason: &str) {
        if let Some(session) = self.sessions[index].take() {
            info!(
                target: "order_server",
                peer = %session.peer,
                client_id = ?session.client_id,
                reason,
                "session dropped"
            );
            if let Some(client) = session.client_id {
                self.client_sessions[client as usize] = None;
            }
        }
    }
}

/// Write the whole buffer, spinning through WouldBlock; the socket thread
/// is allowed to stall, the engine never is.
fn write_fully(stream: &mut TcpStream, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(written) => bytes = &bytes[written..],
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => std::hint::spin_loop(),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::spsc;

    fn server_on_ephemeral_port() -> (
        OrderServer,
        Consumer<ClientRequest>,
        Producer<ClientResponse>,
        SocketAddr,
    ) {
        let cfg = ExchangeConfig {
            order_server_port: 0,
            ..ExchangeConfig::default()
        };
        let (req_tx, req_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let (resp_tx, resp_rx) = spsc(REQUEST_QUEUE_CAPACITY);
        let server = OrderServer::new(&cfg, req_tx, resp_rx, RunFlag::new()).unwrap();
        let addr = SocketAddr::from(([127, 0, 0, 1], server.local_addr().unwrap().port()));
        (server, req_rx, resp_tx, addr)
    }

    fn request_frame(seq: u64, client_id: ClientId) -> Vec<u8> {
        wire::encode_request(&SequencedRequest {
            seq,
            request: ClientRequest {
                kind: ClientRequestKind::New,
                client_id,
                ticker_id: 0,
                order_id: seq,
                side: Side::Buy,
                price: 100,
                qty: 5,
            },
        })
        .to_vec()
    }

    fn poll_until<F: FnMut() -> bool>(server: &mut OrderServer, mut done: F) {
        for _ in 0..10_000 {
            server.poll();
            if done() {
                return;
            }
            std::thread::yield_now();
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_inbound_frames_reach_request_ring() {
        let (mut server, mut req_rx, _resp_tx, addr) = server_on_ephemeral_port();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(&request_frame(1, 3)).unwrap();
        client.write_all(&request_frame(2, 3)).unwrap();

        let mut received = Vec::new();
        poll_until(&mut server, || {
            while let Some(request) = req_rx.pop() {
                received.push(request);
            }
            received.len() == 2
        });
        assert_eq!(received[0].order_id, 1);
        assert_eq!(received[1].order_id, 2);
    }

    #[test]
    fn test_out_of_sequence_frame_skipped() {
        let (mut server, mut req_rx, _resp_tx, addr) = server_on_ephemeral_port();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(&request_frame(1, 3)).unwrap();
        client.write_all(&request_frame(5, 3)).unwrap();
        client.write_all(&request_frame(2, 3)).unwrap();

        let mut received = Vec::new();
        poll_until(&mut server, || {
            while let Some(request) = req_rx.pop() {
                received.push(request);
            }
            received.len() == 2
        });
        // seq 5 was skipped; seqs 1 and 2 passed.
        assert_eq!(received[0].order_id, 1);
        assert_eq!(received[1].order_id, 2);
    }

    #[test]
    fn test_responses_route_back_with_outbound_sequence() {
        let (mut server, mut req_rx, mut resp_tx, addr) = server_on_ephemeral_port();
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();
        client.write_all(&request_frame(1, 3)).unwrap();
        poll_until(&mut server, || req_rx.pop().is_some());

        resp_tx
            .push(ClientResponse {
                kind: ClientResponseKind::Accepted,
                client_id: 3,
                ticker_id: 0,
                client_order_id: 1,
                market_order_id: 1,
                side: Side::Buy,
                price: 100,
                exec_qty: 0,
                leaves_qty: 5,
            })
            .unwrap();

        let mut buf = Vec::new();
        poll_until(&mut server, || {
            let mut chunk = [0u8; 256];
            match client.read(&mut chunk) {
                Ok(len) => buf.extend_from_slice(&chunk[..len]),
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => panic!("client read failed: {err}"),
            }
            buf.len() >= wire::RESPONSE_FRAME_LEN
        });

        let frame = wire::decode_response(&buf).unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.response.kind, ClientResponseKind::Accepted);
        assert_eq!(frame.response.client_id, 3);
    }
}
