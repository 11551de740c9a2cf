//! Order gateway: the client end of the exchange TCP session
//!
//! Serializes outbound requests with a monotonic per-client sequence
//! starting at 1, and validates inbound responses (owning client id,
//! gap-free sequence) before handing them to the trade engine. Violations
//! are logged and skipped; on TCP they indicate an exchange-side bug, not
//! recoverable loss.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use runtime::{Consumer, Producer, RunFlag};
use tracing::{debug, error, info, warn};
use types::prelude::*;
use types::wire;

/// Validate one inbound frame against the session expectations.
fn accept_frame(
    client_id: ClientId,
    next_exp_seq: &mut u64,
    frame: &SequencedResponse,
) -> Result<ClientResponse, SessionError> {
    if frame.response.client_id != client_id {
        return Err(SessionError::ClientIdMismatch {
            expected: client_id as u64,
            received: frame.response.client_id as u64,
        });
    }
    if frame.seq != *next_exp_seq {
        return Err(SessionError::OutOfSequence {
            expected: *next_exp_seq,
            received: frame.seq,
        });
    }
    *next_exp_seq += 1;
    Ok(frame.response)
}

pub struct OrderGateway {
    client_id: ClientId,
    stream: TcpStream,
    requests: Consumer<ClientRequest>,
    responses: Producer<ClientResponse>,
    next_outgoing_seq: u64,
    next_exp_seq: u64,
    rx_buf: Vec<u8>,
    connected: bool,
    run: RunFlag,
}

impl OrderGateway {
    pub fn connect(
        client_id: ClientId,
        cfg: &TradingConfig,
        requests: Consumer<ClientRequest>,
        responses: Producer<ClientResponse>,
        run: RunFlag,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect(&cfg.order_server_addr)?;
        info!(
            target: "order_gw",
            client_id,
            addr = %cfg.order_server_addr,
            "connected to order server"
        );
        Ok(Self::with_stream(client_id, stream, requests, responses, run))
    }

    /// Build around an established stream.
    pub fn with_stream(
        client_id: ClientId,
        stream: TcpStream,
        requests: Consumer<ClientRequest>,
        responses: Producer<ClientResponse>,
        run: RunFlag,
    ) -> Self {
        stream
            .set_nonblocking(true)
            .expect("order session must be non-blocking");
        let _ = stream.set_nodelay(true);
        Self {
            client_id,
            stream,
            requests,
            responses,
            next_outgoing_seq: 1,
            next_exp_seq: 1,
            rx_buf: Vec::with_capacity(4096),
            connected: true,
            run,
        }
    }

    /// One service pass: flush outbound requests, absorb inbound frames.
    pub fn poll(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        let mut worked = self.flush_requests();
        worked |= self.read_responses();
        worked
    }

    pub fn run(&mut self) {
        debug!(target: "order_gw", client_id = self.client_id, "order gateway running");
        while self.run.is_running() {
            if !self.poll() {
                std::hint::spin_loop();
            }
        }
        debug!(target: "order_gw", "order gateway stopped");
    }

    fn flush_requests(&mut self) -> bool {
        let mut worked = false;
        while let Some(request) = self.requests.pop() {
            worked = true;
            let frame = SequencedRequest {
                seq: self.next_outgoing_seq,
                request,
            };
            self.next_outgoing_seq += 1;
            debug!(target: "order_gw", seq = frame.seq, %request, "sending");

            let bytes = wire::encode_request(&frame);
            if let Err(err) = write_fully(&mut self.stream, &bytes) {
                error!(target: "order_gw", %err, "send failed, session down");
                self.connected = false;
                break;
            }
        }
        worked
    }

    fn read_responses(&mut self) -> bool {
        let mut worked = false;
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    error!(target: "order_gw", "order server closed the session");
                    self.connected = false;
                    break;
                }
                Ok(len) => {
                    self.rx_buf.extend_from_slice(&chunk[..len]);
                    worked = true;
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!(target: "order_gw", %err, "read failed, session down");
                    self.connected = false;
                    break;
                }
            }
        }

        let mut consumed = 0;
        while self.rx_buf.len() - consumed >= wire::RESPONSE_FRAME_LEN {
            match wire::decode_response(&self.rx_buf[consumed..]) {
                Ok(frame) => {
                    consumed += wire::RESPONSE_FRAME_LEN;
                    match accept_frame(self.client_id, &mut self.next_exp_seq, &frame) {
                        Ok(response) => {
                            debug!(target: "order_gw", seq = frame.seq, %response, "received");
                            if let Err(dropped) = self.responses.push(response) {
                                error!(
                                    target: "order_gw",
                                    response = %dropped,
                                    "engine ring full, dropping"
                                );
                            }
                        }
                        Err(violation) => {
                            error!(target: "order_gw", %violation, "skipping frame");
                        }
                    }
                }
                Err(err) => {
                    warn!(target: "order_gw", %err, "undecodable frame, session down");
                    self.connected = false;
                    self.rx_buf.clear();
                    return worked;
                }
            }
        }
        self.rx_buf.drain(..consumed);
        worked
    }

    /// Whether the TCP session is still usable.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Outbound requests not yet flushed to the socket.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}

/// Write the whole buffer, spinning through WouldBlock.
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
