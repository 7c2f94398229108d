//! Volume Linker host.
//!
//! Restores the saved link and keeps it running from a hidden message window
//! until the process is asked to close.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "volume-linker")]
#[command(about = "Link the volume of one audio output device to another", long_about = None)]
#[command(version)]
struct Cli {
    /// Print the available output devices and exit
    #[arg(long)]
    list: bool,

    /// Master device, by position in the --list output
    #[arg(long, value_name = "N")]
    master: Option<usize>,

    /// Slave device, by position in the --list output
    #[arg(long, value_name = "N")]
    slave: Option<usize>,

    /// Link on start even if the link was not active last time
    #[arg(short, long)]
    link: bool,

    /// Do not write settings on exit
    #[arg(long)]
    no_save: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = host::run(&cli)?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

#[cfg(not(windows))]
mod host {
    use super::Cli;

    pub fn run(_cli: &Cli) -> anyhow::Result<i32> {
        anyhow::bail!("Volume Linker needs the Windows audio subsystem")
    }
}

#[cfg(windows)]
mod host {
    use super::Cli;
    use anyhow::Context;
    use std::cell::{Cell, RefCell};
    use std::sync::atomic::{AtomicIsize, Ordering};
    use std::sync::{Condvar, Mutex, PoisonError};
    use std::time::Duration;
    use tracing::{error, info, warn};
    use volume_linker_rs::audio::wasapi::{ComGuard, WasapiBackend, WM_VOLUME_NOTIFY};
    use volume_linker_rs::platform::{RegistrySettings, SingleInstance};
    use volume_linker_rs::{AppState, Catalog, LinkController, LinkSettings, LoopControl};
    use windows::core::w;
    use windows::Win32::Foundation::{BOOL, FALSE, HWND, LPARAM, LRESULT, TRUE, WPARAM};
    use windows::Win32::System::Console::{
        SetConsoleCtrlHandler, CTRL_CLOSE_EVENT, CTRL_LOGOFF_EVENT, CTRL_SHUTDOWN_EVENT,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
        PostMessageW, PostQuitMessage, RegisterClassExW, TranslateMessage, CW_USEDEFAULT, MSG,
        WINDOW_EX_STYLE, WM_CLOSE, WM_DESTROY, WM_ENDSESSION, WNDCLASSEXW, WS_OVERLAPPEDWINDOW,
    };

    type HostApp = AppState<WasapiBackend>;

    /// Windows allows about five seconds before killing a closing console.
    const SAVE_WAIT: Duration = Duration::from_secs(4);

    /// Everything the window procedure needs.
    struct Session {
        app: HostApp,
        store: RegistrySettings,
        no_save: bool,
    }

    impl Session {
        fn save(&mut self, pending: Option<LinkSettings>) {
            let Some(pending) = pending else {
                return;
            };

            if self.no_save {
                info!("Settings changed but --no-save was given");
                return;
            }

            match self.store.save(&pending) {
                Ok(()) => {
                    self.app.mark_saved();
                    info!(linked = pending.link_active, "Settings saved");
                }
                Err(e) => error!(error = %e, "Failed to save settings"),
            }
        }
    }

    thread_local! {
        static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
        static EXIT_CODE: Cell<i32> = const { Cell::new(0) };
    }

    /// Host window, for the console control handler thread.
    static HOST_HWND: AtomicIsize = AtomicIsize::new(0);

    /// Set once the host thread has written its settings.
    static SETTINGS_SAVED: Mutex<bool> = Mutex::new(false);
    static SETTINGS_SAVED_CV: Condvar = Condvar::new();

    /// Run `f` on the session, unless it is missing or already borrowed.
    fn with_session<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        SESSION.with(|session| {
            let mut session = session.try_borrow_mut().ok()?;
            session.as_mut().map(f)
        })
    }

    pub fn run(cli: &Cli) -> anyhow::Result<i32> {
        let _com = ComGuard::new().context("COM initialization failed")?;

        if cli.list {
            let backend = WasapiBackend::new(None)?;
            let catalog = Catalog::enumerate(&backend)?;
            for endpoint in catalog.iter() {
                println!("{:>3}  {}  [{}]", endpoint.index(), endpoint.name(), endpoint.id());
            }
            return Ok(0);
        }

        let Some(_instance) = SingleInstance::acquire().context("Instance check failed")? else {
            info!("Volume Linker is already running");
            return Ok(0);
        };

        let hwnd = create_host_window()?;
        HOST_HWND.store(hwnd.0 as isize, Ordering::SeqCst);

        let backend = WasapiBackend::new(Some(hwnd))?;
        let controller = LinkController::new(backend)?;
        let mut app = AppState::new(controller);

        let store = RegistrySettings::new();
        let settings = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load settings, using defaults");
            LinkSettings::default()
        });
        app.restore(&settings, cli.link);

        if cli.master.is_some() || cli.slave.is_some() {
            let (master, slave) = app.selection();
            app.select_devices(cli.master.or(master), cli.slave.or(slave));
            if settings.link_active || cli.link {
                if let Err(e) = app.link() {
                    warn!(error = %e, "Failed to link selected devices");
                }
            }
        }

        log_status(&app);

        SESSION.with(|session| {
            *session.borrow_mut() = Some(Session {
                app,
                store,
                no_save: cli.no_save,
            })
        });

        unsafe {
            if let Err(e) = SetConsoleCtrlHandler(Some(console_ctrl_handler), true) {
                warn!(error = %e, "Failed to install console control handler");
            }
        }

        let exit_code = run_message_loop();

        if let Some(mut session) = SESSION.with(|session| session.borrow_mut().take()) {
            let pending = session.app.pending_settings();
            session.save(pending);
        }

        signal_saved();
        HOST_HWND.store(0, Ordering::SeqCst);

        Ok(exit_code)
    }

    fn signal_saved() {
        let mut saved = SETTINGS_SAVED
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *saved = true;
        SETTINGS_SAVED_CV.notify_all();
    }

    fn log_status(app: &HostApp) {
        let name = |index: Option<usize>| {
            index
                .and_then(|i| app.catalog().get(i).ok())
                .map(|endpoint| endpoint.name().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        };
        let (master, slave) = app.selection();

        info!(
            master = %name(master),
            slave = %name(slave),
            linked = app.is_linked(),
            volume = ?app.slider_position(),
            "Volume Linker running"
        );
    }

    fn create_host_window() -> anyhow::Result<HWND> {
        unsafe {
            let instance = GetModuleHandleW(None)?;

            let window_class = w!("VolumeLinkerWindow");
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(window_proc),
                hInstance: instance.into(),
                lpszClassName: window_class,
                ..Default::default()
            };

            RegisterClassExW(&wc);

            // Never shown; only receives wake-up and close messages
            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                window_class,
                w!("Volume Linker"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                instance,
                None,
            )?;

            Ok(hwnd)
        }
    }

    /// Run until WM_QUIT. Returns the exit code carried by WM_QUIT.
    fn run_message_loop() -> i32 {
        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        msg.wParam.0 as i32
    }

    unsafe extern "system" fn console_ctrl_handler(ctrl_type: u32) -> BOOL {
        let hwnd = HOST_HWND.load(Ordering::SeqCst);
        if hwnd == 0 {
            return FALSE;
        }

        let _ = PostMessageW(
            HWND(hwnd as *mut std::ffi::c_void),
            WM_CLOSE,
            WPARAM(0),
            LPARAM(0),
        );

        // The process is terminated as soon as the handler returns for these
        if matches!(
            ctrl_type,
            CTRL_CLOSE_EVENT | CTRL_LOGOFF_EVENT | CTRL_SHUTDOWN_EVENT
        ) {
            let saved = SETTINGS_SAVED
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let (_saved, wait) = SETTINGS_SAVED_CV
                .wait_timeout_while(saved, SAVE_WAIT, |saved| !*saved)
                .unwrap_or_else(PoisonError::into_inner);
            if wait.timed_out() {
                warn!("Timed out waiting for settings to be saved");
            }
        }
        TRUE
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_VOLUME_NOTIFY => {
                let control = with_session(|session| session.app.pump())
                    .unwrap_or(LoopControl::Continue);
                if let LoopControl::Exit(code) = control {
                    EXIT_CODE.with(|c| c.set(code));
                    let _ = DestroyWindow(hwnd);
                }
                LRESULT(0)
            }
            WM_ENDSESSION => {
                // Logoff or shutdown: the process may be killed once this returns
                if wparam.0 != 0 {
                    info!("Session ending");
                    with_session(|session| {
                        let pending = session.app.end_session();
                        session.save(pending);
                    });
                }
                LRESULT(0)
            }
            WM_CLOSE => {
                info!("Close requested");
                let _ = DestroyWindow(hwnd);
                LRESULT(0)
            }
            WM_DESTROY => {
                PostQuitMessage(EXIT_CODE.with(|c| c.get()));
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
