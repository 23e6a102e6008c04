use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use super::ds::features::SwitchFeatures;
use super::ds::packet_in::PacketIn;
use super::ds::OfMsg;
use super::err::*;

pub mod switch;

/// Events a switch connection hands to the application.
#[derive(Debug, PartialEq, Clone)]
pub enum Event {
    /// The switch finished the handshake and reported its features.
    SwitchFeatures { xid: u32, features: SwitchFeatures },
    /// The switch sent a packet to the controller.
    PacketIn {
        datapath_id: u64,
        xid: u32,
        packet_in: PacketIn,
    },
}

/// Sink for messages going to one switch.
pub trait Datapath {
    /// Queue `msg` for the switch. Fails with `ConnectionClosed` once the
    /// connection is gone.
    fn send_msg(&self, msg: OfMsg) -> Result<()>;
}

/// Controller application driven by switch events.
///
/// Events of one switch are delivered in the order the switch sent them,
/// events of different switches arrive concurrently.
pub trait App: Send + Sync {
    fn handle_event(&self, datapath: &dyn Datapath, event: Event) -> Result<()>;

    /// Called once the connection of an active switch ended.
    fn switch_disconnected(&self, _datapath_id: u64) {}
}

/// Listening side of the controller.
pub struct Controller {
    listener: TcpListener,
}

impl Controller {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        // try starting tcp listener at given address
        info!("Starting tcp listener.");
        let listener = TcpListener::bind(addr)?;
        info!(
            "Tcp listener successfully started at {:?}.",
            listener.local_addr()
        );
        Ok(Controller { listener: listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts switches forever, serving each one on its own thread.
    pub fn run<A: App + 'static>(self, app: Arc<A>) -> Result<()> {
        info!("Starting tcp accept.");
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("Failed to accept switch connection: {}", err);
                    continue;
                }
            };
            let peer = switch::peer_name(&stream);
            info!("Tcp connection from: {}.", peer);
            let app = Arc::clone(&app);
            let spawned = thread::Builder::new()
                .name(format!("Switch-In {}", peer))
                .spawn(move || {
                    if let Err(err) = switch::serve_switch(stream, app) {
                        error!("Connection to {} failed: {}", peer, err);
                    }
                });
            if let Err(err) = spawned {
                error!("Could not start switch thread: {}", err);
            }
        }

        // incoming() never ends
        Ok(())
    }
}

pub fn start_controller<A, T>(addr: A, app: Arc<T>) -> Result<()>
where
    A: ToSocketAddrs,
    T: App + 'static,
{
    Controller::bind(addr)?.run(app)
}
