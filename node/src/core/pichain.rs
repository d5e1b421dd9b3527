use tokio::sync::mpsc;

use crate::{
    api::{application::Application, ApiListener},
    consensus::{
        node::Node,
        timer::{TimerCommand, TimerQueue},
        ConsensusError,
    },
    core::{api_cmd::ApiCmdProcessor, builder::PiChainHandle, shutdown::ShutdownManager},
    network::NetworkEvent,
};

pub struct PiChain<A: Application> {
    /// The consensus state machine. Every event is handed to it one at a time.
    pub(crate) node: Node<A>,

    /// Messages and round trip samples from the network.
    pub(crate) from_network: mpsc::UnboundedReceiver<NetworkEvent>,

    /// Timer requests of the node.
    pub(crate) timer_commands: mpsc::UnboundedReceiver<TimerCommand>,

    pub(crate) timer_queue: TimerQueue,

    /// A component which listens API requests.
    pub(crate) api_listener: ApiListener,

    ///Interface to external Rust code
    pub(crate) pichain_handle: PiChainHandle,

    /// A component which handles shutdown.
    pub(crate) shutdown_manager: Option<ShutdownManager>,
}

impl<A: Application> PiChain<A> {
    pub(crate) fn new(
        node: Node<A>,
        from_network: mpsc::UnboundedReceiver<NetworkEvent>,
        timer_commands: mpsc::UnboundedReceiver<TimerCommand>,
        api_listener: ApiListener,
        pichain_handle: PiChainHandle,
        shutdown_manager: ShutdownManager,
    ) -> Self {
        Self {
            node,
            from_network,
            timer_commands,
            timer_queue: TimerQueue::new(),
            api_listener,
            pichain_handle,
            shutdown_manager: Some(shutdown_manager),
        }
    }

    ///Provides external api for Rust code to interact with the node.
    pub fn handle(&self) -> PiChainHandle {
        self.pichain_handle.clone()
    }

    /// Main loop of the node.
    ///
    /// Network messages, expired timers and API requests are handed to the consensus node one at
    /// a time. The loop ends on shutdown or when the node detects that its committed chain is
    /// inconsistent.
    pub async fn run(mut self) {
        log::info!("Starting piChain...");

        let Some(mut shutdown_manager) = self.shutdown_manager.take() else {
            log::error!("piChain is already running");
            return;
        };

        loop {
            let result = tokio::select! {
                // PROCESSING NETWORK EVENTS
                Some(net_event) = self.from_network.recv() => {
                    self.process_network_event(net_event)
                }

                // SCHEDULING TIMERS
                Some(cmd) = self.timer_commands.recv() => {
                    self.timer_queue.apply(cmd);
                    Ok(())
                }

                // EXPIRED TIMERS
                Some(event) = self.timer_queue.next(), if !self.timer_queue.is_empty() => {
                    self.node.on_timer(event)
                }

                //PROCESSING EXTERNAL API REQUESTS
                api = self.api_listener.messages_rcv.recv() => {
                    match api {
                        Some(api_msg) => ApiCmdProcessor::process_api_requests(&mut self.node, api_msg),
                        None => {
                            log::error!("Error: Api listener channel closed");
                            Ok(())
                        }
                    }
                }

                //PROCESSING SHUTDOWN REQUEST
                _ = shutdown_manager.external_shutdown.recv() => {
                    log::info!("Shutting down piChain");
                    shutdown_manager.stop().await;
                    break;
                }
            };

            match result {
                Ok(()) => {}
                Err(err @ ConsensusError::InconsistentCommit { .. }) => {
                    log::error!("Stopping piChain: {err}");
                    shutdown_manager.stop().await;
                    break;
                }
                Err(err) => log::error!("Error processing event: {err}"),
            }
        }
        log::info!("piChain stopped");
    }

    fn process_network_event(&mut self, net_event: NetworkEvent) -> crate::consensus::Result<()> {
        match net_event {
            NetworkEvent::Message {
                message,
                connection,
            } => {
                log::trace!("New message on connection {connection}: {message}");
                self.node.handle_message(message, Some(connection))
            }
            NetworkEvent::RoundTrip { peer, rtt } => {
                log::trace!("Round trip to node {peer}: {rtt}s");
                self.node.on_round_trip(peer, rtt);
                Ok(())
            }
        }
    }
}
